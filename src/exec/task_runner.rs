// src/exec/task_runner.rs

//! Individual command process runner.

use std::process::Stdio;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::{CommandOutcome, SessionEvent};
use crate::exec::ScheduledCommand;

/// Run a single command, capturing stdout/stderr, and emit a
/// `CommandFinished` event on success/failure.
///
/// - If the cancel channel fires, the child process is killed and **no**
///   `CommandFinished` event is sent for it. The session has already
///   recorded the abort by then.
/// - If the process cannot even be started, the command is reported as a
///   failure carrying the error text.
pub async fn run_command(
    command: ScheduledCommand,
    runtime_tx: mpsc::Sender<SessionEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let component = command.component;
    let index = command.index;
    let started = Instant::now();

    match run_command_inner(&command, cancel_rx, started).await {
        Ok(Some(outcome)) => send_finished(&runtime_tx, &command, outcome).await,
        Ok(None) => {}
        Err(err) => {
            error!(
                component = %component,
                index,
                error = %err,
                "command execution error"
            );
            let outcome = CommandOutcome {
                success: false,
                output: format!("{err:#}"),
                elapsed_ms: elapsed_ms(started),
            };
            send_finished(&runtime_tx, &command, outcome).await;
        }
    }
}

async fn run_command_inner(
    command: &ScheduledCommand,
    mut cancel_rx: oneshot::Receiver<()>,
    started: Instant,
) -> Result<Option<CommandOutcome>> {
    info!(
        component = %command.component,
        index = command.index,
        cmd = %command.command,
        "starting command process"
    );

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&command.command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&command.command);
        c
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for '{}'", command.label))?;

    let stdout = child.stdout.take().map(|s| collect_lines(s, "stdout"));
    let stderr = child.stderr.take().map(|s| collect_lines(s, "stderr"));

    // Either the process exits on its own (normal case), or we receive a
    // cancellation request (user aborted the batch).
    tokio::select! {
        status_res = child.wait() => {
            let status = status_res.with_context(|| {
                format!("waiting for process of '{}'", command.label)
            })?;

            let mut output = join_output(stdout).await;
            let errors = join_output(stderr).await;
            if !errors.is_empty() {
                if !output.is_empty() && !output.ends_with('\n') {
                    output.push('\n');
                }
                output.push_str(&errors);
            }

            let code = status.code().unwrap_or(-1);
            info!(
                component = %command.component,
                index = command.index,
                exit_code = code,
                success = status.success(),
                "command process exited"
            );

            if !status.success() && output.trim().is_empty() {
                output = format!("'{}' exited with code {code}", command.command);
            }

            Ok(Some(CommandOutcome {
                success: status.success(),
                output,
                elapsed_ms: elapsed_ms(started),
            }))
        }

        cancel = &mut cancel_rx => {
            match cancel {
                Ok(()) => {
                    info!(
                        component = %command.component,
                        index = command.index,
                        "cancellation requested for running command; killing process"
                    );
                    if let Err(e) = child.kill().await {
                        warn!(
                            component = %command.component,
                            index = command.index,
                            error = %e,
                            "failed to kill child process on cancellation"
                        );
                    }
                }
                Err(e) => {
                    debug!(
                        component = %command.component,
                        index = command.index,
                        error = %e,
                        "cancel channel closed without explicit cancellation"
                    );
                    // Child will be killed on drop due to kill_on_drop(true).
                }
            }
            Ok(None)
        }
    }
}

/// Read a pipe to the end on a background task, logging each line.
fn collect_lines<R>(pipe: R, stream: &'static str) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(pipe).lines();
        let mut collected = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(stream, "{}", line);
            collected.push_str(&line);
            collected.push('\n');
        }
        collected
    })
}

async fn join_output(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(h) => h.await.unwrap_or_default(),
        None => String::new(),
    }
}

async fn send_finished(
    runtime_tx: &mpsc::Sender<SessionEvent>,
    command: &ScheduledCommand,
    outcome: CommandOutcome,
) {
    let event = SessionEvent::CommandFinished {
        component: command.component,
        index: command.index,
        outcome,
    };
    if runtime_tx.send(event).await.is_err() {
        debug!(
            component = %command.component,
            index = command.index,
            "runtime channel closed; dropping command result"
        );
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
