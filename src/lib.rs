// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod interact;
pub mod logging;
pub mod router;
pub mod service;
pub mod task;
pub mod types;
pub mod workflow;

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigStore, default_settings_path, load_or_default};
use crate::engine::event_handlers::NOTHING_TO_DO;
use crate::engine::{Runtime, RuntimeOptions, SessionCore, SessionEvent};
use crate::exec::RealExecutorBackend;
use crate::interact::{AutoApprove, TerminalInteraction};
use crate::router::Router;
use crate::service::{LanguageService, PlanService, TOOL_SCHEDULE};
use crate::task::has_define_task;
use crate::types::SessionContext;
use crate::workflow::component::CommandProps;
use crate::workflow::{
    Component, ComponentDefinition, FeedbackKind, WorkflowHandlers, WorkflowQueue,
};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading
/// - the language service
/// - session core / runtime
/// - executor
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let settings_path = args
        .settings
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_settings_path);
    let mut settings = load_or_default(&settings_path)?;

    let service = match &args.plan {
        Some(path) => PlanService::from_path(path)?,
        None => PlanService::passthrough(),
    };

    let request = args.request();
    let context = SessionContext::new(settings.debug_level());

    if args.dry_run {
        let queue = plan_pipeline(&service, &request, context, &mut settings).await?;
        print_dry_run(&queue);
        return Ok(());
    }

    // Session event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<SessionEvent>(64);

    // Process executor backend (real implementation in production).
    let executor = RealExecutorBackend::new(rt_tx.clone());

    // Ctrl-C → abort whatever has focus; once idle, the next one stops.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                    return;
                }
                if tx.send(SessionEvent::AbortRequested).await.is_err() {
                    return;
                }
            }
        });
    }

    info!(%request, "submitting request");
    rt_tx
        .send(SessionEvent::CommandSubmitted { command: request })
        .await?;

    let options = RuntimeOptions {
        exit_when_idle: true,
    };

    // Construct the pure session core (single source of truth for semantics).
    let core = SessionCore::new(context, Box::new(settings), options);

    // Construct the async IO shell around the core.
    let timeline = if args.yes {
        Runtime::new(core, rt_rx, rt_tx, executor, service, AutoApprove)
            .run()
            .await?
    } else {
        let interaction = TerminalInteraction::new();
        Runtime::new(core, rt_rx, rt_tx, executor, service, interaction)
            .run()
            .await?
    };

    let failures = count_failures(&timeline);
    if failures > 0 {
        anyhow::bail!("session finished with {failures} error(s)");
    }
    Ok(())
}

/// Classify `request` and route it as if every confirmation were accepted,
/// without running anything.
///
/// A request with unresolved choices stops at its `Schedule`.
pub async fn plan_pipeline<L: LanguageService>(
    service: &L,
    request: &str,
    context: SessionContext,
    config: &mut dyn ConfigStore,
) -> Result<WorkflowQueue> {
    let response = service.process_with_tool(request, TOOL_SCHEDULE).await?;

    let mut queue = WorkflowQueue::new();
    queue.add_to_timeline(Component::Command(CommandProps {
        command: request.to_string(),
    }));

    let interactive = has_define_task(&response.tasks);
    let mut router = Router::new(context, config);
    let routed = router.route(
        response.tasks,
        &response.message,
        request,
        &mut queue,
        interactive,
    );
    if !routed {
        queue.add_to_queue(Component::Message(NOTHING_TO_DO.to_string()));
        return Ok(queue);
    }

    if let Some(Component::Confirm(confirm)) = queue.focused().map(|d| d.component.clone()) {
        router.on_confirmed(confirm.tasks, &confirm.schedule_message, &mut queue);
    }
    Ok(queue)
}

fn count_failures(timeline: &[ComponentDefinition]) -> usize {
    timeline
        .iter()
        .filter(|def| {
            matches!(&def.component, Component::Feedback(f) if f.kind == FeedbackKind::Failed)
        })
        .count()
}

/// Simple dry-run output: every definition the request would go through.
fn print_dry_run(queue: &WorkflowQueue) {
    println!("taskpilot dry-run");
    println!();

    let entries = queue
        .timeline()
        .iter()
        .chain(queue.active())
        .chain(queue.pending())
        .chain(queue.queued());

    for def in entries {
        println!("{} {:?} ({:?})", def.id, def.name(), def.status);
        for line in def.to_string().lines() {
            println!("    {line}");
        }
    }

    debug!("dry-run complete (no execution)");
}
