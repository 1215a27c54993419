// src/engine/core.rs

//! Pure session state machine.
//!
//! This module contains a synchronous, deterministic "session core" that
//! consumes [`SessionEvent`]s and produces:
//! - an updated workflow queue and timeline
//! - a list of commands describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - calling the language service and prompting the user
//! - sending commands to the executor
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes.

use tracing::{debug, info};

use crate::config::ConfigStore;
use crate::engine::event_handlers::{
    CoreStep, EngineCommand, activation_commands, handle_cancelled, handle_command_finished,
    handle_command_submitted, handle_confirmed, handle_option_selected, handle_service_failure,
    handle_service_response, handle_settings_provided,
};
use crate::engine::{RuntimeOptions, SessionEvent};
use crate::errors::Result;
use crate::types::SessionContext;
use crate::workflow::{ComponentDefinition, WorkflowQueue};

/// Pure session state.
///
/// This owns:
/// - the workflow queue (active step, queued steps, timeline)
/// - the session context handed to the router
/// - the settings store
/// - runtime options (e.g. `exit_when_idle`)
///
/// It has **no** channels, no Tokio types, and performs no IO apart from
/// [`SessionCore::persist_settings`], which the shell calls on request.
#[derive(Debug)]
pub struct SessionCore {
    queue: WorkflowQueue,
    context: SessionContext,
    config: Box<dyn ConfigStore>,
    options: RuntimeOptions,
}

impl SessionCore {
    pub fn new(
        context: SessionContext,
        config: Box<dyn ConfigStore>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            queue: WorkflowQueue::new(),
            context,
            config,
            options,
        }
    }

    pub fn queue(&self) -> &WorkflowQueue {
        &self.queue
    }

    pub fn timeline(&self) -> &[ComponentDefinition] {
        self.queue.timeline()
    }

    pub fn into_timeline(self) -> Vec<ComponentDefinition> {
        self.queue.timeline().to_vec()
    }

    pub fn config(&self) -> &dyn ConfigStore {
        self.config.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    /// Write settings changed by `Config`/`Validate` steps.
    pub fn persist_settings(&self) -> Result<()> {
        self.config.persist()
    }

    /// Handle a single session event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: SessionEvent) -> CoreStep {
        let queue = &mut self.queue;
        let config = self.config.as_mut();
        let context = self.context;

        let mut commands = match event {
            SessionEvent::CommandSubmitted { command } => handle_command_submitted(queue, command),
            SessionEvent::ServiceResponded {
                component,
                response,
            } => handle_service_response(queue, config, context, component, response),
            SessionEvent::ServiceFailed { component, error } => {
                handle_service_failure(queue, component, error)
            }
            SessionEvent::OptionSelected {
                component,
                group,
                option,
            } => handle_option_selected(queue, config, context, component, group, option),
            SessionEvent::Confirmed { component } => {
                handle_confirmed(queue, config, context, component)
            }
            SessionEvent::Cancelled { component } => {
                handle_cancelled(queue, config, context, component)
            }
            SessionEvent::SettingsProvided { component, values } => {
                handle_settings_provided(queue, config, component, values)
            }
            SessionEvent::CommandFinished {
                component,
                index,
                outcome,
            } => handle_command_finished(queue, component, index, outcome),
            SessionEvent::AbortRequested => match queue.focused().map(|def| def.id) {
                Some(component) => handle_cancelled(queue, config, context, component),
                None => {
                    info!("abort requested while idle; stopping");
                    return CoreStep {
                        commands: Vec::new(),
                        keep_running: false,
                    };
                }
            },
            SessionEvent::ShutdownRequested => {
                return CoreStep {
                    commands: Vec::new(),
                    keep_running: false,
                };
            }
        };

        commands.extend(activation_commands(queue));

        // With `exit_when_idle`, the session ends once nothing is active,
        // paired or queued.
        let mut keep_running = true;
        if self.options.exit_when_idle && self.queue.is_idle() {
            debug!("session idle; requesting exit");
            keep_running = false;
            commands.push(EngineCommand::RequestExit);
        }

        CoreStep {
            commands,
            keep_running,
        }
    }
}
