// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::interact::Interaction;
use crate::service::LanguageService;
use crate::workflow::ComponentDefinition;

use super::core::SessionCore;
use super::{EngineCommand, SessionEvent};

/// Drives the session core in response to `SessionEvent`s and delegates
/// the slow work to its collaborators:
/// - shell commands to an `ExecutorBackend`
/// - classification and answers to a `LanguageService`
/// - user decisions to an `Interaction`
///
/// This is a pure IO shell around `SessionCore`, which contains all the
/// session semantics. Service calls and prompts run in spawned tasks that
/// report back through the event channel, so the loop never blocks on them.
pub struct Runtime<E, L, I>
where
    E: ExecutorBackend,
    L: LanguageService + 'static,
    I: Interaction + 'static,
{
    core: SessionCore,
    event_rx: mpsc::Receiver<SessionEvent>,
    event_tx: mpsc::Sender<SessionEvent>,
    executor: E,
    service: Arc<L>,
    interaction: Arc<I>,
    /// Timeline entries already written to stdout.
    printed: usize,
    echo: bool,
}

impl<E, L, I> fmt::Debug for Runtime<E, L, I>
where
    E: ExecutorBackend,
    L: LanguageService + 'static,
    I: Interaction + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("printed", &self.printed)
            .finish_non_exhaustive()
    }
}

impl<E, L, I> Runtime<E, L, I>
where
    E: ExecutorBackend,
    L: LanguageService + 'static,
    I: Interaction + 'static,
{
    /// `event_tx` must feed `event_rx`; spawned prompts and service calls
    /// report through it.
    pub fn new(
        core: SessionCore,
        event_rx: mpsc::Receiver<SessionEvent>,
        event_tx: mpsc::Sender<SessionEvent>,
        executor: E,
        service: L,
        interaction: I,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            executor,
            service: Arc::new(service),
            interaction: Arc::new(interaction),
            printed: 0,
            echo: true,
        }
    }

    /// Do not write finished timeline entries to stdout.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Main event loop.
    ///
    /// - Consumes `SessionEvent`s from `event_rx`.
    /// - Feeds them into the session core.
    /// - Executes commands returned by the core (service calls, prompts,
    ///   commands, exit).
    ///
    /// Returns the session timeline once the core asks to stop.
    pub async fn run(mut self) -> Result<Vec<ComponentDefinition>> {
        info!("taskpilot runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            // Feed the event into the pure core and get commands back.
            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            self.print_new_entries();

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(self.core.into_timeline())
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: EngineCommand) -> Result<()> {
        match command {
            EngineCommand::CallService {
                component,
                tool,
                prompt,
            } => {
                debug!(component = %component, tool, "calling language service");
                let service = Arc::clone(&self.service);
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let event = match service.process_with_tool(&prompt, tool).await {
                        Ok(response) => SessionEvent::ServiceResponded {
                            component,
                            response,
                        },
                        Err(err) => SessionEvent::ServiceFailed {
                            component,
                            error: err.to_string(),
                        },
                    };
                    let _ = tx.send(event).await;
                });
            }
            EngineCommand::PromptSelection {
                component,
                group,
                options,
            } => {
                let interaction = Arc::clone(&self.interaction);
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let event = match interaction.select_option(&options).await {
                        Some(option) => SessionEvent::OptionSelected {
                            component,
                            group,
                            option,
                        },
                        None => SessionEvent::Cancelled { component },
                    };
                    let _ = tx.send(event).await;
                });
            }
            EngineCommand::PromptConfirmation { component, message } => {
                let interaction = Arc::clone(&self.interaction);
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let event = if interaction.confirm(&message).await {
                        SessionEvent::Confirmed { component }
                    } else {
                        SessionEvent::Cancelled { component }
                    };
                    let _ = tx.send(event).await;
                });
            }
            EngineCommand::CollectSettings { component, fields } => {
                let interaction = Arc::clone(&self.interaction);
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let event = match interaction.collect_values(&fields).await {
                        Some(values) => SessionEvent::SettingsProvided { component, values },
                        None => SessionEvent::Cancelled { component },
                    };
                    let _ = tx.send(event).await;
                });
            }
            EngineCommand::RunCommand(command) => {
                debug!(
                    component = %command.component,
                    index = command.index,
                    label = %command.label,
                    "spawning command"
                );
                self.executor.spawn_command(command).await?;
            }
            EngineCommand::CancelCommand(component) => {
                self.executor.cancel(component).await?;
            }
            EngineCommand::PersistSettings => {
                // A failed write loses the values for the next session only.
                if let Err(err) = self.core.persist_settings() {
                    warn!(error = %err, "failed to save settings");
                }
            }
            EngineCommand::RequestExit => {
                info!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    fn print_new_entries(&mut self) {
        let timeline = self.core.timeline();
        if self.echo {
            for def in &timeline[self.printed..] {
                println!("{def}");
            }
        }
        self.printed = timeline.len();
    }
}
