// src/engine/event_handlers.rs

//! Event handling logic for the session core.

use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::engine::CommandOutcome;
use crate::exec::ScheduledCommand;
use crate::exec::reducer::{ExecutionAction, ExecutionEvent, ExecutionState, reduce};
use crate::router::{Operation, Router};
use crate::service::{TOOL_ANSWER, TOOL_INTROSPECT, TOOL_SCHEDULE, ToolResponse};
use crate::task::has_define_task;
use crate::types::SessionContext;
use crate::workflow::component::{
    CommandProps, IntrospectState, OptionGroup, ScheduleState, SettingField,
};
use crate::workflow::{Component, ComponentId, RequestHandlers, WorkflowHandlers, WorkflowQueue};

/// Shown when a classified request leaves nothing to schedule.
pub const NOTHING_TO_DO: &str = "Nothing to do.";

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Ask the language service to process `prompt` with `tool`.
    CallService {
        component: ComponentId,
        tool: &'static str,
        prompt: String,
    },
    /// Ask the user to pick one option of a choice group.
    PromptSelection {
        component: ComponentId,
        group: usize,
        options: OptionGroup,
    },
    /// Ask the user to accept or decline.
    PromptConfirmation {
        component: ComponentId,
        message: String,
    },
    /// Ask the user for settings values.
    CollectSettings {
        component: ComponentId,
        fields: Vec<SettingField>,
    },
    /// Start one command of an `Execute` batch.
    RunCommand(ScheduledCommand),
    /// Kill whatever runs for this `Execute` batch.
    CancelCommand(ComponentId),
    /// Write the settings store back to disk.
    PersistSettings,
    /// Request that the process exits (the session is idle).
    RequestExit,
}

/// Decision returned by the core after handling a single `SessionEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<EngineCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Queue a freshly typed request for classification.
pub fn handle_command_submitted(queue: &mut WorkflowQueue, command: String) -> Vec<EngineCommand> {
    let command = command.trim().to_string();
    if command.is_empty() {
        warn!("empty request submitted; ignoring");
        return Vec::new();
    }

    info!(%command, "request submitted");
    queue.add_to_queue(Component::Command(CommandProps { command }));
    Vec::new()
}

/// Apply a language service response to the component that asked for it.
///
/// - `Command` / `Refinement`: the response is a classification and is
///   routed into a new schedule.
/// - `Answer`: the message is the answer.
/// - `Introspect`: the message heads the list of capabilities, one per task.
pub fn handle_service_response(
    queue: &mut WorkflowQueue,
    config: &mut dyn ConfigStore,
    context: SessionContext,
    component: ComponentId,
    response: ToolResponse,
) -> Vec<EngineCommand> {
    let Some(def) = queue.live_mut(component) else {
        warn!(component = %component, "service response for a component that is not live; ignoring");
        return Vec::new();
    };

    match &mut def.component {
        Component::Command(props) => {
            let original = props.command.clone();
            queue.complete_active();
            route_response(queue, config, context, response, &original);
        }
        Component::Refinement(props) => {
            let original = props.original_command.clone();
            queue.complete_active();
            route_response(queue, config, context, response, &original);
        }
        Component::Answer(props) => {
            debug!(component = %component, question = %props.question, "answer received");
            props.state = Some(response.message);
            queue.complete_active();
        }
        Component::Introspect(props) => {
            let capabilities = response.tasks.into_iter().map(|t| t.action).collect();
            props.state = Some(IntrospectState {
                message: response.message,
                capabilities,
            });
            queue.complete_active();
        }
        other => {
            warn!(component = %component, name = ?other.name(), "unexpected service response; ignoring");
        }
    }

    Vec::new()
}

fn route_response(
    queue: &mut WorkflowQueue,
    config: &mut dyn ConfigStore,
    context: SessionContext,
    response: ToolResponse,
    original_command: &str,
) {
    let interactive = has_define_task(&response.tasks);
    let routed = Router::new(context, config).route(
        response.tasks,
        &response.message,
        original_command,
        queue,
        interactive,
    );

    if !routed {
        let text = if response.message.trim().is_empty() {
            NOTHING_TO_DO.to_string()
        } else {
            response.message
        };
        queue.add_to_queue(Component::Message(text));
    }
}

/// A language service call failed: report it and move on.
pub fn handle_service_failure(
    queue: &mut WorkflowQueue,
    component: ComponentId,
    error: String,
) -> Vec<EngineCommand> {
    let Some(def) = queue.live(component) else {
        warn!(component = %component, %error, "service failure for a component that is not live; ignoring");
        return Vec::new();
    };

    let message = match &def.component {
        Component::Command(_) | Component::Refinement(_) => {
            format!("Could not understand the request: {error}")
        }
        Component::Answer(props) => format!("Could not answer '{}': {error}", props.question),
        Component::Introspect(_) => format!("Could not describe capabilities: {error}"),
        other => {
            warn!(component = %component, name = ?other.name(), "unexpected service failure; ignoring");
            return Vec::new();
        }
    };

    queue.complete_active();
    queue.on_error(message);
    Vec::new()
}

/// Record one option choice; re-classify once every choice is made.
pub fn handle_option_selected(
    queue: &mut WorkflowQueue,
    config: &mut dyn ConfigStore,
    context: SessionContext,
    component: ComponentId,
    group: usize,
    option: usize,
) -> Vec<EngineCommand> {
    let Some(Component::Schedule(props)) = queue.live_mut(component).map(|d| &mut d.component)
    else {
        warn!(component = %component, "selection for a component that is not a live schedule; ignoring");
        return Vec::new();
    };

    if !props.state.select(group, option) {
        warn!(component = %component, group, option, "invalid selection; asking again");
        return prompt_selection(component, &props.state).into_iter().collect();
    }

    if !props.state.is_resolved() {
        return prompt_selection(component, &props.state).into_iter().collect();
    }

    let schedule = props.clone();
    Router::new(context, config).on_choices_resolved(&schedule, queue);
    Vec::new()
}

/// The user accepted a `Confirm`: dispatch its tasks.
pub fn handle_confirmed(
    queue: &mut WorkflowQueue,
    config: &mut dyn ConfigStore,
    context: SessionContext,
    component: ComponentId,
) -> Vec<EngineCommand> {
    let Some(Component::Confirm(props)) = queue.live(component).map(|d| &d.component) else {
        warn!(component = %component, "confirmation for a component that is not a live confirm; ignoring");
        return Vec::new();
    };

    let props = props.clone();
    Router::new(context, config).on_confirmed(props.tasks, &props.schedule_message, queue);
    Vec::new()
}

/// Abort `component`, whatever it is.
///
/// - `Schedule` / `Confirm`: feedback only, nothing was started.
/// - `Execute`: the batch takes the reducer's abort transition, the queue
///   is cleared and the running command is killed.
/// - anything else: the queue is cleared with a cancellation feedback.
pub fn handle_cancelled(
    queue: &mut WorkflowQueue,
    config: &mut dyn ConfigStore,
    context: SessionContext,
    component: ComponentId,
) -> Vec<EngineCommand> {
    let Some(def) = queue.live_mut(component) else {
        warn!(component = %component, "cancel for a component that is not live; ignoring");
        return Vec::new();
    };

    let reason = match &mut def.component {
        Component::Schedule(props) => {
            let tasks = props.tasks.clone();
            Router::new(context, config).on_cancelled(&tasks, queue);
            return Vec::new();
        }
        Component::Confirm(props) => {
            let tasks = props.tasks.clone();
            Router::new(context, config).on_cancelled(&tasks, queue);
            return Vec::new();
        }
        Component::Execute(props) => {
            let step = reduce(&props.state, ExecutionEvent::Aborted);
            props.state = step.state;
            info!(component = %component, completed = props.state.completed, "execution aborted");
            queue.on_aborted(Operation::Execution.as_str());
            return vec![EngineCommand::CancelCommand(component)];
        }
        Component::Config(_) | Component::Validate(_) => "configuration",
        Component::Answer(_) => Operation::Answer.as_str(),
        Component::Introspect(_) => Operation::Introspection.as_str(),
        Component::Command(_) | Component::Refinement(_) => "request",
        other => {
            warn!(component = %component, name = ?other.name(), "component cannot be cancelled; ignoring");
            return Vec::new();
        }
    };

    info!(component = %component, reason, "cancelled by user");
    queue.on_aborted(reason);
    Vec::new()
}

/// Store user-provided settings and complete the `Config`/`Validate` step.
pub fn handle_settings_provided(
    queue: &mut WorkflowQueue,
    config: &mut dyn ConfigStore,
    component: ComponentId,
    values: Vec<(String, String)>,
) -> Vec<EngineCommand> {
    let Some(Component::Config(props) | Component::Validate(props)) =
        queue.live_mut(component).map(|d| &mut d.component)
    else {
        warn!(component = %component, "settings for a component that is not live; ignoring");
        return Vec::new();
    };

    let mut applied = Vec::new();
    let mut errors = Vec::new();
    for (key, value) in values {
        match config.set_value(&key, &value) {
            Ok(()) => applied.push((key, value)),
            Err(err) => errors.push(format!("Could not set {key}: {err}")),
        }
    }

    debug!(component = %component, applied = applied.len(), failed = errors.len(), "settings provided");
    let changed = !applied.is_empty();
    props.state = applied;
    queue.complete_active();
    for error in errors {
        queue.on_error(error);
    }

    if changed {
        vec![EngineCommand::PersistSettings]
    } else {
        Vec::new()
    }
}

/// Feed a finished command into the batch reducer.
pub fn handle_command_finished(
    queue: &mut WorkflowQueue,
    component: ComponentId,
    index: usize,
    outcome: CommandOutcome,
) -> Vec<EngineCommand> {
    let Some(Component::Execute(props)) = queue.live_mut(component).map(|d| &mut d.component)
    else {
        warn!(component = %component, index, "command result for a batch that is not live; ignoring");
        return Vec::new();
    };

    let event = if outcome.success {
        ExecutionEvent::TaskSucceeded {
            index,
            elapsed_ms: outcome.elapsed_ms,
            output: outcome.output,
        }
    } else {
        let error = if outcome.output.trim().is_empty() {
            "command failed".to_string()
        } else {
            outcome.output.trim_end().to_string()
        };
        ExecutionEvent::TaskFailed { index, error }
    };

    let step = reduce(&props.state, event);
    match step.action {
        ExecutionAction::RunNext { index: next } => {
            let command = scheduled_command(component, next, &step.state);
            props.state = step.state;
            command.map(EngineCommand::RunCommand).into_iter().collect()
        }
        ExecutionAction::Completed { message } => {
            info!(component = %component, %message, "batch completed");
            queue.on_completed(step.state);
            Vec::new()
        }
        ExecutionAction::TaskError { index, error } => {
            let label = step
                .state
                .tasks
                .get(index)
                .map(|t| t.label.clone())
                .unwrap_or_default();
            warn!(component = %component, index, %label, "task failed; batch stopped");
            queue.on_task_failed(step.state, format!("{label}: {error}"));
            Vec::new()
        }
        ExecutionAction::Cancelled | ExecutionAction::Ignored => Vec::new(),
    }
}

/// Commands starting the work of every newly active component.
pub fn activation_commands(queue: &mut WorkflowQueue) -> Vec<EngineCommand> {
    let mut commands = Vec::new();

    loop {
        let activated = queue.take_activations();
        if activated.is_empty() {
            break;
        }

        for id in activated {
            let Some(def) = queue.live(id) else {
                debug!(component = %id, "activated component already done; skipping");
                continue;
            };

            match &def.component {
                Component::Command(props) => commands.push(EngineCommand::CallService {
                    component: id,
                    tool: TOOL_SCHEDULE,
                    prompt: props.command.clone(),
                }),
                Component::Refinement(props) => commands.push(EngineCommand::CallService {
                    component: id,
                    tool: TOOL_SCHEDULE,
                    prompt: props.prompt.clone(),
                }),
                Component::Schedule(props) => {
                    if !props.auto_confirm {
                        commands.extend(prompt_selection(id, &props.state));
                    }
                }
                Component::Confirm(props) => commands.push(EngineCommand::PromptConfirmation {
                    component: id,
                    message: props.message.clone(),
                }),
                Component::Config(props) | Component::Validate(props) => {
                    commands.push(EngineCommand::CollectSettings {
                        component: id,
                        fields: props.fields.clone(),
                    })
                }
                Component::Execute(props) => match props.state.next_pending() {
                    Some(index) => commands.extend(
                        scheduled_command(id, index, &props.state).map(EngineCommand::RunCommand),
                    ),
                    None => {
                        debug!(component = %id, "empty batch; completing immediately");
                        let state = props.state.clone();
                        queue.on_completed(state);
                    }
                },
                Component::Answer(props) => commands.push(EngineCommand::CallService {
                    component: id,
                    tool: TOOL_ANSWER,
                    prompt: props.question.clone(),
                }),
                Component::Introspect(props) => {
                    let prompt: Vec<&str> = props.tasks.iter().map(|t| t.action.as_str()).collect();
                    commands.push(EngineCommand::CallService {
                        component: id,
                        tool: TOOL_INTROSPECT,
                        prompt: prompt.join("\n"),
                    })
                }
                Component::Feedback(_) | Component::Message(_) | Component::Debug(_) => {}
            }
        }
    }

    commands
}

fn prompt_selection(component: ComponentId, state: &ScheduleState) -> Option<EngineCommand> {
    let group = state.current_group()?;
    Some(EngineCommand::PromptSelection {
        component,
        group,
        options: state.groups[group].clone(),
    })
}

fn scheduled_command(
    component: ComponentId,
    index: usize,
    state: &ExecutionState,
) -> Option<ScheduledCommand> {
    state.tasks.get(index).map(|record| ScheduledCommand {
        component,
        index,
        label: record.label.clone(),
        command: record.command.clone(),
    })
}
