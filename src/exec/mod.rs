// src/exec/mod.rs

//! Command execution layer.
//!
//! - [`reducer`] is the pure per-batch state machine driving an `Execute`
//!   component through success, failure and cancellation.
//! - [`backend`] provides the `ExecutorBackend` trait and the
//!   `RealExecutorBackend` the runtime uses in production; tests replace it
//!   with a fake.
//! - [`executor_loop`] owns the background loop that tracks the running
//!   process of each component.
//! - [`task_runner`] runs one shell command with `tokio::process::Command`
//!   and reports the outcome back to the runtime.

pub mod backend;
pub mod executor_loop;
pub mod reducer;
pub mod task_runner;

use crate::workflow::ComponentId;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::{RunningCommands, spawn_executor};

/// A single command the session wants run now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCommand {
    /// `Execute` component the command belongs to.
    pub component: ComponentId,
    /// Position of the command inside the component's batch.
    pub index: usize,
    pub label: String,
    pub command: String,
}

/// Request sent to the background executor loop.
#[derive(Debug, Clone)]
pub enum ExecRequest {
    Run(ScheduledCommand),
    /// Kill whatever is running for this component; nothing is reported.
    Cancel(ComponentId),
}
