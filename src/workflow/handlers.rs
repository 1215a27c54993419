// src/workflow/handlers.rs

//! Handler contracts through which the router and the session core reach
//! the workflow queue.
//!
//! Nothing outside the queue mutates the queue or the timeline directly; the
//! router only ever sees `&mut impl WorkflowHandlers + RequestHandlers`.

use crate::exec::reducer::ExecutionState;
use crate::workflow::component::{Component, ComponentId};

/// Lifecycle operations on the queue.
pub trait WorkflowHandlers {
    /// Append to the tail as `Awaiting`; promoted immediately if nothing is
    /// active.
    fn add_to_queue(&mut self, component: Component) -> ComponentId;

    /// Record a component with no interactive phase directly as `Done`.
    fn add_to_timeline(&mut self, component: Component) -> ComponentId;

    /// Place a component in the pending slot beside the active one so both
    /// can be resolved as a single decision.
    fn pair_with_active(&mut self, component: Component) -> ComponentId;

    fn complete_active(&mut self);

    /// Complete the active component and its paired pending one together.
    fn complete_active_and_pending(&mut self);
}

/// Failure, cancellation and completion reporting.
pub trait RequestHandlers {
    /// Report a failure as feedback appended to the queue.
    fn on_error(&mut self, message: String);

    /// Finish whatever is active, drop all queued work and report the
    /// cancellation of `reason` (e.g. `"execution"`).
    fn on_aborted(&mut self, reason: &str);

    /// Store the final state of the active `Execute` and complete it.
    fn on_completed(&mut self, state: ExecutionState);

    /// Like [`RequestHandlers::on_completed`] for a batch stopped by a
    /// failing task: the failure feedback is recorded right after the batch,
    /// before anything queued behind it.
    fn on_task_failed(&mut self, state: ExecutionState, message: String);
}
