use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use taskpilot::engine::{CommandOutcome, SessionEvent};
use taskpilot::errors::Result;
use taskpilot::exec::{ExecutorBackend, ScheduledCommand};
use taskpilot::workflow::ComponentId;

/// A fake executor that:
/// - records which commands were "run" and which batches were cancelled
/// - immediately reports `CommandFinished` for each scheduled command,
///   failing the ones marked with [`FakeExecutor::failing`]
/// - never reports commands marked with [`FakeExecutor::holding`], so a test
///   can abort them mid-flight.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<SessionEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    cancelled: Arc<Mutex<Vec<ComponentId>>>,
    failing: HashSet<String>,
    holding: HashSet<String>,
    elapsed_ms: u64,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<SessionEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            cancelled: Arc::new(Mutex::new(Vec::new())),
            failing: HashSet::new(),
            holding: HashSet::new(),
            elapsed_ms: 1000,
        }
    }

    pub fn failing(mut self, command: &str) -> Self {
        self.failing.insert(command.to_string());
        self
    }

    pub fn holding(mut self, command: &str) -> Self {
        self.holding.insert(command.to_string());
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn with_cancelled(mut self, cancelled: Arc<Mutex<Vec<ComponentId>>>) -> Self {
        self.cancelled = cancelled;
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_command(
        &mut self,
        command: ScheduledCommand,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let success = !self.failing.contains(&command.command);
        let hold = self.holding.contains(&command.command);
        let elapsed_ms = self.elapsed_ms;

        Box::pin(async move {
            {
                let mut guard = executed.lock().unwrap();
                guard.push(command.command.clone());
            }

            if hold {
                return Ok(());
            }

            let output = if success {
                format!("ran {}", command.command)
            } else {
                format!("{} exited with code 1", command.command)
            };

            tx.send(SessionEvent::CommandFinished {
                component: command.component,
                index: command.index,
                outcome: CommandOutcome {
                    success,
                    output,
                    elapsed_ms,
                },
            })
            .await
            .map_err(anyhow::Error::from)?;
            Ok(())
        })
    }

    fn cancel(
        &mut self,
        component: ComponentId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let cancelled = Arc::clone(&self.cancelled);
        Box::pin(async move {
            cancelled.lock().unwrap().push(component);
            Ok(())
        })
    }
}
