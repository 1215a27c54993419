// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production executor implementation in [`executor_loop`](super::executor_loop).
//!
//! - `RealExecutorBackend` is the default implementation. It wraps the
//!   background executor loop and forwards requests over an mpsc channel.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which commands were scheduled and directly emits `CommandFinished`
//!   events.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::engine::SessionEvent;
use crate::errors::{Error, Result};
use crate::exec::{ExecRequest, ScheduledCommand, spawn_executor};
use crate::workflow::ComponentId;

/// Trait abstracting how scheduled commands are executed.
///
/// Implementations report every finished command back to the runtime as a
/// `SessionEvent::CommandFinished`. A cancelled command reports nothing.
pub trait ExecutorBackend: Send {
    /// Start the given command.
    fn spawn_command(
        &mut self,
        command: ScheduledCommand,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Stop the command currently running for `component`, if any.
    fn cancel(
        &mut self,
        component: ComponentId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Real executor backend used in production.
///
/// Internally, this just wraps the executor loop in [`spawn_executor`].
pub struct RealExecutorBackend {
    tx: mpsc::Sender<ExecRequest>,
}

impl RealExecutorBackend {
    /// Create a new real executor backend, wiring it to the given session
    /// event sender.
    ///
    /// This spawns the background executor loop immediately.
    pub fn new(runtime_tx: mpsc::Sender<SessionEvent>) -> Self {
        let tx = spawn_executor(runtime_tx);
        Self { tx }
    }

    fn send(&self, request: ExecRequest) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();
        Box::pin(async move {
            tx.send(request).await.map_err(Error::from)?;
            Ok(())
        })
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_command(
        &mut self,
        command: ScheduledCommand,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.send(ExecRequest::Run(command))
    }

    fn cancel(
        &mut self,
        component: ComponentId,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.send(ExecRequest::Cancel(component))
    }
}
