// src/workflow/queue.rs

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::exec::reducer::ExecutionState;
use crate::workflow::component::{Component, ComponentDefinition, ComponentId, ComponentStatus};
use crate::workflow::handlers::{RequestHandlers, WorkflowHandlers};

/// Single-active-item queue of component definitions.
///
/// Semantics:
/// - At most one definition is `Active` at a time. The only exception is the
///   pending slot, which pairs a second definition with the active one (e.g.
///   a `Confirm` beside its `Schedule`) until both are completed together.
/// - Definitions leave the queue and enter the timeline in the order they
///   were enqueued.
/// - Non-interactive definitions (`Feedback`, `Message`, `Debug`) are moved
///   to the timeline as soon as they reach the head of the queue.
/// - Every promotion is recorded so the session core can react to newly
///   active definitions (see [`WorkflowQueue::take_activations`]).
#[derive(Debug, Default)]
pub struct WorkflowQueue {
    /// Monotonically increasing definition ID.
    next_id: u64,
    queue: VecDeque<ComponentDefinition>,
    active: Option<ComponentDefinition>,
    pending: Option<ComponentDefinition>,
    timeline: Vec<ComponentDefinition>,
    activations: Vec<ComponentId>,
}

impl WorkflowQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nothing active, nothing pending, nothing waiting.
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.pending.is_none() && self.queue.is_empty()
    }

    pub fn active(&self) -> Option<&ComponentDefinition> {
        self.active.as_ref()
    }

    pub fn pending(&self) -> Option<&ComponentDefinition> {
        self.pending.as_ref()
    }

    /// The definition currently receiving user input: the paired pending one
    /// if present, otherwise the active one.
    pub fn focused(&self) -> Option<&ComponentDefinition> {
        self.pending.as_ref().or(self.active.as_ref())
    }

    /// Awaiting definitions, head first.
    pub fn queued(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.queue.iter()
    }

    /// Completed definitions, oldest first.
    pub fn timeline(&self) -> &[ComponentDefinition] {
        &self.timeline
    }

    /// Look up an active or pending definition by ID.
    pub fn live(&self, id: ComponentId) -> Option<&ComponentDefinition> {
        [self.active.as_ref(), self.pending.as_ref()]
            .into_iter()
            .flatten()
            .find(|def| def.id == id)
    }

    /// Mutable access to an active or pending definition, for its own handler.
    pub fn live_mut(&mut self, id: ComponentId) -> Option<&mut ComponentDefinition> {
        if self.active.as_ref().is_some_and(|d| d.id == id) {
            return self.active.as_mut();
        }
        if self.pending.as_ref().is_some_and(|d| d.id == id) {
            return self.pending.as_mut();
        }
        None
    }

    /// Drain the IDs of definitions promoted since the last call.
    pub fn take_activations(&mut self) -> Vec<ComponentId> {
        std::mem::take(&mut self.activations)
    }

    /// Drop every awaiting definition. Returns how many were dropped.
    pub fn clear_queue(&mut self) -> usize {
        let dropped = self.queue.len();
        if dropped > 0 {
            let names: Vec<_> = self.queue.iter().map(|d| d.name()).collect();
            debug!(dropped, ?names, "clearing queued components");
        }
        self.queue.clear();
        dropped
    }

    fn allocate(&mut self, component: Component, status: ComponentStatus) -> ComponentDefinition {
        self.next_id += 1;
        ComponentDefinition {
            id: ComponentId(self.next_id),
            status,
            component,
        }
    }

    fn finish(&mut self, mut def: ComponentDefinition) {
        def.status = ComponentStatus::Done;
        debug!(component = %def.id, name = ?def.name(), "component done");
        self.timeline.push(def);
    }

    fn store_execution(&mut self, state: ExecutionState) {
        match self.active.as_mut().map(|def| &mut def.component) {
            Some(Component::Execute(props)) => props.state = state,
            _ => warn!("no active execution to store the final state on"),
        }
    }

    /// Fill the active slot from the head of the queue.
    fn promote(&mut self) {
        if self.active.is_some() {
            return;
        }

        // A paired definition outlives its partner only if the partner was
        // completed alone; it then takes over the active slot.
        if let Some(def) = self.pending.take() {
            debug!(component = %def.id, name = ?def.name(), "pending component takes active slot");
            self.active = Some(def);
            return;
        }

        while let Some(mut def) = self.queue.pop_front() {
            if !def.component.is_interactive() {
                self.finish(def);
                continue;
            }
            def.status = ComponentStatus::Active;
            debug!(component = %def.id, name = ?def.name(), "component promoted to active");
            self.activations.push(def.id);
            self.active = Some(def);
            break;
        }
    }
}

impl WorkflowHandlers for WorkflowQueue {
    fn add_to_queue(&mut self, component: Component) -> ComponentId {
        let def = self.allocate(component, ComponentStatus::Awaiting);
        let id = def.id;
        debug!(component = %id, name = ?def.name(), "component queued");
        self.queue.push_back(def);
        self.promote();
        id
    }

    fn add_to_timeline(&mut self, component: Component) -> ComponentId {
        let def = self.allocate(component, ComponentStatus::Done);
        let id = def.id;
        self.finish(def);
        id
    }

    fn pair_with_active(&mut self, component: Component) -> ComponentId {
        if self.active.is_none() {
            warn!("pairing requested with no active component; queueing instead");
            return self.add_to_queue(component);
        }

        if let Some(previous) = self.pending.take() {
            warn!(component = %previous.id, "replacing pending component; completing previous");
            self.finish(previous);
        }

        let def = self.allocate(component, ComponentStatus::Active);
        let id = def.id;
        debug!(component = %id, name = ?def.name(), "component paired with active");
        self.activations.push(id);
        self.pending = Some(def);
        id
    }

    fn complete_active(&mut self) {
        match self.active.take() {
            Some(def) => self.finish(def),
            None => warn!("complete_active called with no active component; ignoring"),
        }
        self.promote();
    }

    fn complete_active_and_pending(&mut self) {
        if let Some(def) = self.active.take() {
            self.finish(def);
        }
        if let Some(def) = self.pending.take() {
            self.finish(def);
        }
        self.promote();
    }
}

impl RequestHandlers for WorkflowQueue {
    fn on_error(&mut self, message: String) {
        warn!(%message, "reporting failure");
        self.add_to_queue(Component::failed(message));
    }

    fn on_aborted(&mut self, reason: &str) {
        debug!(reason, "aborting workflow");
        if let Some(def) = self.active.take() {
            self.finish(def);
        }
        if let Some(def) = self.pending.take() {
            self.finish(def);
        }
        self.clear_queue();
        self.add_to_queue(Component::aborted(reason));
    }

    fn on_completed(&mut self, state: ExecutionState) {
        self.store_execution(state);
        self.complete_active();
    }

    fn on_task_failed(&mut self, state: ExecutionState, message: String) {
        self.store_execution(state);
        match self.active.take() {
            Some(def) => self.finish(def),
            None => warn!("on_task_failed called with no active component"),
        }
        warn!(%message, "reporting task failure");
        self.add_to_timeline(Component::failed(message));
        self.promote();
    }
}
