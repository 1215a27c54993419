// tests/plan_service.rs

mod common;
use crate::common::builders::{define, execute};

use std::error::Error;
use std::fs;

use tempfile::tempdir;

use taskpilot::service::{
    LanguageService, PlanFile, PlanService, SELECTED_OPTIONS_HEADER, TOOL_ANSWER,
    TOOL_INTROSPECT, TOOL_SCHEDULE,
};
use taskpilot::task::{Task, TaskType};
use taskpilot::errors::TaskpilotError;

type TestResult = Result<(), Box<dyn Error>>;

fn deploy_plan() -> PlanFile {
    PlanFile {
        message: "Deploy the site".to_string(),
        tasks: vec![
            execute("npm run build"),
            define("Which environment?", &["staging", "production"])
                .with_config(["deploy.token"]),
        ],
        answers: [("What is Rust?".to_string(), "A language.".to_string())]
            .into_iter()
            .collect(),
    }
}

#[tokio::test]
async fn schedule_returns_the_plan_for_a_plain_request() -> TestResult {
    let service = PlanService::new(deploy_plan());

    let response = service.process_with_tool("deploy", TOOL_SCHEDULE).await?;

    assert_eq!(response.message, "Deploy the site");
    assert_eq!(response.tasks, deploy_plan().tasks);
    Ok(())
}

#[tokio::test]
async fn schedule_resolves_answered_choices() -> TestResult {
    let service = PlanService::new(deploy_plan());
    let prompt = format!("deploy\n\n{SELECTED_OPTIONS_HEADER}\n- Which environment?: production");

    let response = service.process_with_tool(&prompt, TOOL_SCHEDULE).await?;

    assert_eq!(
        response.tasks,
        vec![
            execute("npm run build"),
            Task::new("production", TaskType::Execute).with_config(["deploy.token"]),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn unanswered_choices_stay_defined() -> TestResult {
    let service = PlanService::new(deploy_plan());
    let prompt = format!("deploy\n\n{SELECTED_OPTIONS_HEADER}\n- Which region?: eu");

    let response = service.process_with_tool(&prompt, TOOL_SCHEDULE).await?;

    assert_eq!(response.tasks, deploy_plan().tasks);
    Ok(())
}

#[tokio::test]
async fn passthrough_runs_the_request_as_typed() -> TestResult {
    let service = PlanService::passthrough();

    let response = service
        .process_with_tool("  cargo test --all  ", TOOL_SCHEDULE)
        .await?;

    assert_eq!(response.message, "Run `cargo test --all`");
    assert_eq!(response.tasks, vec![execute("cargo test --all")]);
    Ok(())
}

#[tokio::test]
async fn answers_come_from_the_plan() -> TestResult {
    let service = PlanService::new(deploy_plan());

    let response = service.process_with_tool("What is Rust?", TOOL_ANSWER).await?;
    assert_eq!(response.message, "A language.");
    assert!(response.tasks.is_empty());

    let missing = service.process_with_tool("What is Go?", TOOL_ANSWER).await;
    assert!(matches!(missing, Err(TaskpilotError::ServiceError(_))));
    Ok(())
}

#[tokio::test]
async fn introspect_lists_capabilities() -> TestResult {
    let service = PlanService::passthrough();

    let response = service.process_with_tool("", TOOL_INTROSPECT).await?;

    assert_eq!(response.message, "Here is what I can do:");
    assert!(!response.tasks.is_empty());
    assert!(
        response
            .tasks
            .iter()
            .all(|t| t.kind == TaskType::Introspect)
    );
    Ok(())
}

#[tokio::test]
async fn unknown_tool_is_a_service_error() {
    let service = PlanService::passthrough();

    let err = service
        .process_with_tool("anything", "translate")
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Language service error: unknown tool 'translate'"
    );
}

#[tokio::test]
async fn plan_is_loaded_from_json_file() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("plan.json");
    fs::write(
        &path,
        r#"{
            "message": "Set up",
            "tasks": [
                { "action": "Install", "type": "execute", "params": { "command": "npm ci" } },
                { "action": "Project path", "type": "config", "params": { "key": "project.path" } },
                { "action": "Checks", "type": "group", "subtasks": [
                    { "action": "npm test", "type": "execute" }
                ] }
            ]
        }"#,
    )?;

    let service = PlanService::from_path(&path)?;
    let response = service.process_with_tool("set up", TOOL_SCHEDULE).await?;

    assert_eq!(response.message, "Set up");
    assert_eq!(response.tasks.len(), 3);
    assert_eq!(response.tasks[0].command(), "npm ci");
    assert_eq!(response.tasks[1].config_key(), "project.path");
    assert_eq!(response.tasks[2].subtasks, vec![execute("npm test")]);
    Ok(())
}

#[test]
fn empty_or_null_params_mean_no_params() -> TestResult {
    let tasks: Vec<Task> = serde_json::from_str(
        r#"[
            { "action": "ls", "type": "execute", "params": {} },
            { "action": "pwd", "type": "execute", "params": null },
            { "action": "Which shell?", "type": "define", "params": { "options": ["bash", "zsh"] } }
        ]"#,
    )?;

    assert_eq!(tasks[0], execute("ls"));
    assert_eq!(tasks[1], execute("pwd"));
    assert_eq!(tasks[2], define("Which shell?", &["bash", "zsh"]));
    Ok(())
}

#[test]
fn unknown_params_are_rejected() {
    let parsed = serde_json::from_str::<Task>(
        r#"{ "action": "ls", "type": "execute", "params": { "flags": "-la" } }"#,
    );
    assert!(parsed.is_err());
}

#[test]
fn malformed_plan_file_is_a_json_error() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("plan.json");
    fs::write(&path, "{ \"tasks\": [ { \"action\": 1 } ] }")?;

    let err = PlanService::from_path(&path).unwrap_err();
    assert!(matches!(err, TaskpilotError::JsonError(_)));
    Ok(())
}

#[test]
fn missing_plan_file_is_an_io_error() {
    let err = PlanService::from_path("/definitely/not/here/plan.json").unwrap_err();
    assert!(matches!(err, TaskpilotError::IoError(_)));
}
