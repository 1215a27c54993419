// src/workflow/mod.rs

//! Workflow queue: sequencing of component definitions.
//!
//! - [`component`] defines the per-name component payloads.
//! - [`handlers`] defines the contracts the router and session core use to
//!   reach the queue.
//! - [`queue`] implements the single-active-item state machine and the
//!   timeline of completed definitions.

pub mod component;
pub mod handlers;
pub mod queue;

pub use component::{
    Component, ComponentDefinition, ComponentId, ComponentName, ComponentStatus, FeedbackKind,
};
pub use handlers::{RequestHandlers, WorkflowHandlers};
pub use queue::WorkflowQueue;
