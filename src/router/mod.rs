// src/router/mod.rs

//! Turns classified tasks into an ordered pipeline of component definitions.
//!
//! The router is stateless between calls. It reaches the workflow queue only
//! through the handler traits and never touches a definition after
//! enqueueing it. User decisions arrive as continuation calls
//! ([`Router::on_selection_confirmed`], [`Router::on_confirmed`], ...) made
//! by the session core when the matching event comes in.
//!
//! - [`flatten`] holds the pure task-list transformations.
//! - [`dispatch`] turns a confirmed task list into executor definitions.

pub mod dispatch;
pub mod flatten;

use tracing::{debug, info};

use crate::config::ConfigStore;
use crate::service::SELECTED_OPTIONS_HEADER;
use crate::task::{Task, TaskType, leaves};
use crate::types::{DebugLevel, SessionContext};
use crate::workflow::component::{
    ConfirmProps, DebugProps, RefinementProps, ScheduleProps, ScheduleState,
};
use crate::workflow::{Component, RequestHandlers, WorkflowHandlers};

pub use flatten::{Operation, drop_ignored, flatten_tasks, operation_name};

pub struct Router<'a> {
    context: SessionContext,
    config: &'a mut dyn ConfigStore,
}

impl<'a> Router<'a> {
    pub fn new(context: SessionContext, config: &'a mut dyn ConfigStore) -> Self {
        Self { context, config }
    }

    /// Schedule a freshly classified task list.
    ///
    /// Enqueues a `Schedule` for the filtered and flattened tasks. Without an
    /// interactive choice the schedule confirms itself straight away and a
    /// `Confirm` is paired with it; otherwise the session waits for the
    /// user's option selection.
    ///
    /// Returns `false` if nothing was left to schedule.
    pub fn route<H>(
        &mut self,
        tasks: Vec<Task>,
        schedule_message: &str,
        original_command: &str,
        handlers: &mut H,
        has_interactive_choice: bool,
    ) -> bool
    where
        H: WorkflowHandlers + RequestHandlers,
    {
        if tasks.is_empty() {
            debug!("route called with no tasks; nothing to schedule");
            return false;
        }

        let tasks = flatten_tasks(&drop_ignored(tasks));
        if tasks.is_empty() {
            debug!("every task was ignored or empty; nothing to schedule");
            return false;
        }

        if let Some(entry) = self.debug_entry(&tasks) {
            handlers.add_to_timeline(entry);
        }

        info!(
            tasks = tasks.len(),
            interactive = has_interactive_choice,
            "scheduling classified tasks"
        );

        let state = ScheduleState::from_tasks(&tasks);
        handlers.add_to_queue(Component::Schedule(ScheduleProps {
            message: schedule_message.to_string(),
            tasks: tasks.clone(),
            original_command: original_command.to_string(),
            auto_confirm: !has_interactive_choice,
            state,
        }));

        if !has_interactive_choice {
            self.on_selection_confirmed(tasks, schedule_message, handlers);
        }
        true
    }

    /// A concrete task list is available: ask the user to confirm it.
    pub fn on_selection_confirmed<H>(&mut self, tasks: Vec<Task>, schedule_message: &str, handlers: &mut H)
    where
        H: WorkflowHandlers,
    {
        let operation = operation_name(&tasks);
        let message = confirmation_message(operation, &tasks);
        debug!(%operation, %message, "requesting confirmation");
        handlers.pair_with_active(Component::Confirm(ConfirmProps {
            message,
            tasks,
            operation,
            schedule_message: schedule_message.to_string(),
        }));
    }

    /// The user resolved every choice of the active schedule: complete it
    /// and ask the language service to re-classify with those choices.
    pub fn on_choices_resolved<H>(&mut self, schedule: &ScheduleProps, handlers: &mut H)
    where
        H: WorkflowHandlers,
    {
        let prompt = refinement_prompt(&schedule.original_command, &schedule.state);
        debug!(%prompt, "choices resolved; requesting refinement");
        handlers.complete_active();
        handlers.add_to_queue(Component::Refinement(RefinementProps {
            prompt,
            original_command: schedule.original_command.clone(),
        }));
    }

    /// The user declined at the confirmation step.
    pub fn on_cancelled<H>(&mut self, tasks: &[Task], handlers: &mut H)
    where
        H: WorkflowHandlers,
    {
        let operation = operation_name(tasks);
        info!(%operation, "confirmation declined");
        handlers.complete_active_and_pending();
        handlers.add_to_queue(Component::aborted(operation.as_str()));
    }

    /// The user accepted at the confirmation step: resolve the pair and
    /// dispatch the confirmed tasks to their executors.
    pub fn on_confirmed<H>(&mut self, tasks: Vec<Task>, schedule_message: &str, handlers: &mut H)
    where
        H: WorkflowHandlers + RequestHandlers,
    {
        info!(tasks = tasks.len(), "confirmation accepted; dispatching");
        handlers.complete_active_and_pending();
        dispatch::dispatch_confirmed(self.config, tasks, schedule_message, handlers);
    }

    fn debug_entry(&self, tasks: &[Task]) -> Option<Component> {
        let lines = match self.context.debug() {
            DebugLevel::None => return None,
            DebugLevel::Info => vec![type_counts(tasks)],
            DebugLevel::Verbose => {
                let mut lines = Vec::new();
                describe_tree(tasks, 0, &mut lines);
                lines
            }
        };
        Some(Component::Debug(DebugProps {
            title: format!("Routing {} task(s)", tasks.len()),
            lines,
        }))
    }
}

/// Question shown at the confirmation step.
pub fn confirmation_message(operation: Operation, tasks: &[Task]) -> String {
    let count = leaves(tasks).len();
    match operation {
        Operation::Introspection => "Should I describe what I can do?".to_string(),
        Operation::Answer if count == 1 => "Should I answer this question?".to_string(),
        Operation::Answer => format!("Should I answer these {count} questions?"),
        Operation::Execution if count == 1 => "Should I run this task?".to_string(),
        Operation::Execution => format!("Should I run these {count} tasks?"),
    }
}

/// Prompt sent back to the language service once choices are resolved.
pub fn refinement_prompt(original_command: &str, state: &ScheduleState) -> String {
    let mut prompt = original_command.trim().to_string();
    let chosen = state.chosen();
    if !chosen.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(SELECTED_OPTIONS_HEADER);
        for (question, option) in chosen {
            prompt.push_str(&format!("\n- {question}: {option}"));
        }
    }
    prompt
}

fn type_counts(tasks: &[Task]) -> String {
    let mut counts: Vec<(TaskType, usize)> = Vec::new();
    for leaf in leaves(tasks) {
        match counts.iter_mut().find(|(kind, _)| *kind == leaf.kind) {
            Some((_, n)) => *n += 1,
            None => counts.push((leaf.kind, 1)),
        }
    }
    let parts: Vec<String> = counts
        .into_iter()
        .map(|(kind, n)| format!("{n} {kind}"))
        .collect();
    parts.join(", ")
}

fn describe_tree(tasks: &[Task], depth: usize, lines: &mut Vec<String>) {
    for task in tasks {
        let mut line = format!("{}- {} ({})", "  ".repeat(depth), task.action, task.kind);
        if !task.config.is_empty() {
            line.push_str(&format!(" requires [{}]", task.config.join(", ")));
        }
        lines.push(line);
        describe_tree(&task.subtasks, depth + 1, lines);
    }
}
