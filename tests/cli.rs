// tests/cli.rs

mod common;
use crate::common::builders::{define, execute};
use crate::common::names;

use std::error::Error;

use clap::Parser;

use taskpilot::cli::{CliArgs, LogLevel};
use taskpilot::config::Settings;
use taskpilot::logging::resolve_level;
use taskpilot::plan_pipeline;
use taskpilot::service::{PlanFile, PlanService};
use taskpilot::types::SessionContext;
use taskpilot::workflow::{Component, ComponentName};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn request_words_are_joined() -> TestResult {
    let args = CliArgs::try_parse_from(["taskpilot", "install", "and", "test"])?;

    assert_eq!(args.request(), "install and test");
    assert!(!args.yes);
    assert!(!args.dry_run);
    assert!(args.plan.is_none());
    Ok(())
}

#[test]
fn flags_are_parsed() -> TestResult {
    let args = CliArgs::try_parse_from([
        "taskpilot",
        "-y",
        "--dry-run",
        "--plan",
        "plan.json",
        "--settings",
        "custom.toml",
        "--log-level",
        "debug",
        "deploy",
    ])?;

    assert!(args.yes);
    assert!(args.dry_run);
    assert_eq!(args.plan.as_deref(), Some("plan.json"));
    assert_eq!(args.settings.as_deref(), Some("custom.toml"));
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    assert_eq!(args.request(), "deploy");
    Ok(())
}

#[test]
fn request_is_required() {
    assert!(CliArgs::try_parse_from(["taskpilot"]).is_err());
}

#[test]
fn log_level_prefers_cli_then_env_then_warn() {
    assert_eq!(
        resolve_level(Some(LogLevel::Trace), Some("error")),
        tracing::Level::TRACE
    );
    assert_eq!(resolve_level(None, Some(" Info ")), tracing::Level::INFO);
    assert_eq!(resolve_level(None, Some("warning")), tracing::Level::WARN);
    assert_eq!(resolve_level(None, Some("loud")), tracing::Level::WARN);
    assert_eq!(resolve_level(None, None), tracing::Level::WARN);
}

#[tokio::test]
async fn dry_run_routes_through_confirmation() -> TestResult {
    let service = PlanService::passthrough();
    let mut settings = Settings::in_memory();

    let queue = plan_pipeline(
        &service,
        "make build",
        SessionContext::default(),
        &mut settings,
    )
    .await?;

    assert_eq!(
        names(queue.timeline()),
        vec![
            ComponentName::Command,
            ComponentName::Schedule,
            ComponentName::Confirm
        ]
    );
    match queue.active().map(|d| &d.component) {
        Some(Component::Execute(props)) => {
            assert_eq!(props.tasks, vec![execute("make build")]);
        }
        other => panic!("expected an active Execute, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn dry_run_stops_at_unresolved_choices() -> TestResult {
    let service = PlanService::new(PlanFile {
        message: "Deploy".to_string(),
        tasks: vec![define("Which environment?", &["staging", "production"])],
        ..PlanFile::default()
    });
    let mut settings = Settings::in_memory();

    let queue = plan_pipeline(&service, "deploy", SessionContext::default(), &mut settings).await?;

    assert_eq!(names(queue.timeline()), vec![ComponentName::Command]);
    assert!(matches!(
        queue.active().map(|d| &d.component),
        Some(Component::Schedule(s)) if !s.auto_confirm
    ));
    assert!(queue.pending().is_none());
    Ok(())
}
