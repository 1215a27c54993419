#![allow(dead_code)]

pub use taskpilot_test_utils::builders;
pub use taskpilot_test_utils::{init_tracing, with_timeout};

use taskpilot::workflow::{Component, ComponentDefinition, ComponentName, FeedbackKind};

/// Names of a list of definitions, in order.
pub fn names(defs: &[ComponentDefinition]) -> Vec<ComponentName> {
    defs.iter().map(|d| d.name()).collect()
}

/// `(kind, message)` of every feedback entry, in order.
pub fn feedback(defs: &[ComponentDefinition]) -> Vec<(FeedbackKind, String)> {
    defs.iter()
        .filter_map(|d| match &d.component {
            Component::Feedback(f) => Some((f.kind, f.message.clone())),
            _ => None,
        })
        .collect()
}
