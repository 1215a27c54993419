// src/exec/executor_loop.rs

//! Main executor loop that manages running command processes.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::engine::SessionEvent;
use crate::exec::task_runner::run_command;
use crate::exec::{ExecRequest, ScheduledCommand};
use crate::workflow::ComponentId;

/// Internal handle for a currently-running command process.
///
/// - `cancel` is used by the executor to request that the process be stopped
///   (used when the user aborts the batch).
/// - `handle` is the Tokio task that is actually running the command.
struct ActiveCommand {
    index: usize,
    cancel: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

/// Per-component bookkeeping of running command processes.
///
/// At most one entry per component. Entries whose task has finished are
/// pruned whenever a new command starts.
#[derive(Default)]
pub struct RunningCommands {
    active: HashMap<ComponentId, ActiveCommand>,
}

impl RunningCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands still tracked, finished or not.
    pub fn tracked(&self) -> usize {
        self.active.len()
    }

    /// Forget every command whose runner task has ended. Returns how many
    /// entries were dropped.
    pub fn prune_finished(&mut self) -> usize {
        let before = self.active.len();
        self.active.retain(|_, cmd| !cmd.handle.is_finished());
        let pruned = before - self.active.len();
        if pruned > 0 {
            debug!(pruned, "forgot finished commands");
        }
        pruned
    }

    /// Start `command` on its own task, cancelling whatever still runs for
    /// the same component.
    pub fn start(&mut self, command: ScheduledCommand, runtime_tx: &mpsc::Sender<SessionEvent>) {
        self.prune_finished();
        let component = command.component;

        if let Some(existing) = self.active.get_mut(&component) {
            warn!(
                component = %component,
                running = existing.index,
                requested = command.index,
                "component already has a running command; cancelling it first"
            );
            if let Some(cancel) = existing.cancel.take() {
                let _ = cancel.send(());
            }
        }

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let rt_tx = runtime_tx.clone();
        let index = command.index;

        let handle = tokio::spawn(async move {
            run_command(command, rt_tx, cancel_rx).await;
            debug!(component = %component, index, "command runner future finished");
        });

        self.active.insert(
            component,
            ActiveCommand {
                index,
                cancel: Some(cancel_tx),
                handle,
            },
        );
    }

    /// Cancel the running command of a component. Returns `false` if nothing
    /// was tracked for it.
    pub fn cancel(&mut self, component: ComponentId) -> bool {
        let Some(mut existing) = self.active.remove(&component) else {
            debug!(component = %component, "cancel requested but nothing is running");
            return false;
        };

        info!(
            component = %component,
            index = existing.index,
            "cancelling running command"
        );

        if let Some(cancel) = existing.cancel.take() {
            if cancel.send(()).is_err() {
                debug!(
                    component = %component,
                    index = existing.index,
                    "command already finished while cancelling"
                );
            }
        }
        true
    }
}

/// Spawn the background executor loop.
///
/// The returned `mpsc::Sender<ExecRequest>` is what `RealExecutorBackend`
/// forwards to. Each command is executed in its own Tokio task, and **per
/// component there will never be more than one process running at the same
/// time**: batches run their commands strictly one after another.
pub fn spawn_executor(runtime_tx: mpsc::Sender<SessionEvent>) -> mpsc::Sender<ExecRequest> {
    let (tx, mut rx) = mpsc::channel::<ExecRequest>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        let mut running = RunningCommands::new();

        while let Some(request) = rx.recv().await {
            match request {
                ExecRequest::Run(command) => running.start(command, &runtime_tx),
                ExecRequest::Cancel(component) => {
                    running.cancel(component);
                }
            }
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}
