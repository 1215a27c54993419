// src/engine/mod.rs

//! Session engine for taskpilot.
//!
//! This module ties together:
//! - the workflow queue (what the user sees, one active step at a time)
//! - the router (what a classified request turns into)
//! - the main runtime event loop that reacts to:
//!   - language service responses
//!   - user decisions (selections, confirmations, settings)
//!   - command completion events
//!   - abort and shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::service::ToolResponse;
use crate::workflow::ComponentId;

/// Result of one shell command as reported by an executor backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    /// Captured stdout followed by stderr, or the error text.
    pub output: String,
    pub elapsed_ms: u64,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// If true, exit the runtime once the workflow queue is idle.
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from collaborators and the user.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The user typed a request.
    CommandSubmitted { command: String },
    /// The language service answered a request made for `component`.
    ServiceResponded {
        component: ComponentId,
        response: ToolResponse,
    },
    /// The language service call made for `component` failed.
    ServiceFailed {
        component: ComponentId,
        error: String,
    },
    /// The user picked `option` in choice group `group` of a schedule.
    OptionSelected {
        component: ComponentId,
        group: usize,
        option: usize,
    },
    /// The user accepted a confirmation.
    Confirmed { component: ComponentId },
    /// The user declined whatever `component` asked for.
    Cancelled { component: ComponentId },
    /// The user provided values for a `Config` or `Validate` step.
    SettingsProvided {
        component: ComponentId,
        values: Vec<(String, String)>,
    },
    /// A command of an `Execute` batch exited.
    CommandFinished {
        component: ComponentId,
        index: usize,
        outcome: CommandOutcome,
    },
    /// Abort whatever currently has focus (e.g. Ctrl-C).
    AbortRequested,
    /// Stop the runtime.
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::SessionCore;
pub use event_handlers::{CoreStep, EngineCommand};
pub use runtime::Runtime;
