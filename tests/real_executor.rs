// tests/real_executor.rs

#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;

use tokio::sync::mpsc;
use tokio::time::{Duration, sleep, timeout};

use taskpilot::engine::SessionEvent;
use taskpilot::exec::{ExecRequest, RunningCommands, ScheduledCommand, spawn_executor};
use taskpilot::workflow::ComponentId;

type TestResult = Result<(), Box<dyn Error>>;

fn scheduled(component: u64, index: usize, command: &str) -> ScheduledCommand {
    ScheduledCommand {
        component: ComponentId(component),
        index,
        label: command.to_string(),
        command: command.to_string(),
    }
}

#[tokio::test]
async fn successful_command_reports_its_output() -> TestResult {
    init_tracing();

    let (tx, mut rx) = mpsc::channel::<SessionEvent>(8);
    let exec_tx = spawn_executor(tx);

    exec_tx
        .send(ExecRequest::Run(scheduled(1, 0, "echo hello")))
        .await?;

    match with_timeout(rx.recv()).await {
        Some(SessionEvent::CommandFinished {
            component,
            index,
            outcome,
        }) => {
            assert_eq!(component, ComponentId(1));
            assert_eq!(index, 0);
            assert!(outcome.success);
            assert_eq!(outcome.output, "hello\n");
        }
        other => panic!("expected CommandFinished, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn silent_failure_reports_exit_code() -> TestResult {
    init_tracing();

    let (tx, mut rx) = mpsc::channel::<SessionEvent>(8);
    let exec_tx = spawn_executor(tx);

    exec_tx
        .send(ExecRequest::Run(scheduled(2, 3, "exit 3")))
        .await?;

    match with_timeout(rx.recv()).await {
        Some(SessionEvent::CommandFinished { index, outcome, .. }) => {
            assert_eq!(index, 3);
            assert!(!outcome.success);
            assert_eq!(outcome.output, "'exit 3' exited with code 3");
        }
        other => panic!("expected CommandFinished, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn stderr_is_appended_after_stdout() -> TestResult {
    init_tracing();

    let (tx, mut rx) = mpsc::channel::<SessionEvent>(8);
    let exec_tx = spawn_executor(tx);

    exec_tx
        .send(ExecRequest::Run(scheduled(
            3,
            0,
            "echo out; echo err 1>&2; exit 1",
        )))
        .await?;

    match with_timeout(rx.recv()).await {
        Some(SessionEvent::CommandFinished { outcome, .. }) => {
            assert!(!outcome.success);
            assert_eq!(outcome.output, "out\nerr\n");
        }
        other => panic!("expected CommandFinished, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn cancelled_command_reports_nothing() -> TestResult {
    init_tracing();

    let (tx, mut rx) = mpsc::channel::<SessionEvent>(8);
    let exec_tx = spawn_executor(tx);

    exec_tx
        .send(ExecRequest::Run(scheduled(4, 0, "sleep 5")))
        .await?;
    sleep(Duration::from_millis(100)).await;
    exec_tx.send(ExecRequest::Cancel(ComponentId(4))).await?;

    let received = timeout(Duration::from_millis(500), rx.recv()).await;
    assert!(received.is_err(), "cancelled command must not report");
    Ok(())
}

#[tokio::test]
async fn cancel_without_running_command_is_harmless() -> TestResult {
    init_tracing();

    let (tx, mut rx) = mpsc::channel::<SessionEvent>(8);
    let exec_tx = spawn_executor(tx);

    exec_tx.send(ExecRequest::Cancel(ComponentId(9))).await?;
    exec_tx
        .send(ExecRequest::Run(scheduled(9, 0, "true")))
        .await?;

    match with_timeout(rx.recv()).await {
        Some(SessionEvent::CommandFinished { outcome, .. }) => assert!(outcome.success),
        other => panic!("expected CommandFinished, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn finished_commands_are_forgotten() -> TestResult {
    init_tracing();

    let (tx, mut rx) = mpsc::channel::<SessionEvent>(8);
    let mut running = RunningCommands::new();

    running.start(scheduled(1, 0, "true"), &tx);
    running.start(scheduled(2, 0, "true"), &tx);
    assert_eq!(running.tracked(), 2);

    for _ in 0..2 {
        assert!(matches!(
            with_timeout(rx.recv()).await,
            Some(SessionEvent::CommandFinished { .. })
        ));
    }

    with_timeout(async {
        while running.tracked() > 0 {
            running.prune_finished();
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    assert!(!running.cancel(ComponentId(1)));
    Ok(())
}

#[tokio::test]
async fn starting_a_new_command_prunes_finished_ones() -> TestResult {
    init_tracing();

    let (tx, mut rx) = mpsc::channel::<SessionEvent>(8);
    let mut running = RunningCommands::new();

    running.start(scheduled(1, 0, "true"), &tx);
    assert!(matches!(
        with_timeout(rx.recv()).await,
        Some(SessionEvent::CommandFinished { .. })
    ));
    // Let the runner task wind down after reporting.
    sleep(Duration::from_millis(100)).await;

    running.start(scheduled(2, 0, "sleep 5"), &tx);
    assert_eq!(running.tracked(), 1);
    assert!(running.cancel(ComponentId(2)));
    assert_eq!(running.tracked(), 0);
    Ok(())
}
