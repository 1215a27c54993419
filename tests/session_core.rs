// tests/session_core.rs

mod common;
use crate::common::builders::{SettingsBuilder, answer, define, execute, group, response};
use crate::common::{feedback, init_tracing, names};

use taskpilot::config::{ConfigStore, Settings};
use taskpilot::engine::{
    CommandOutcome, EngineCommand, RuntimeOptions, SessionCore, SessionEvent,
};
use taskpilot::engine::event_handlers::NOTHING_TO_DO;
use taskpilot::exec::ScheduledCommand;
use taskpilot::exec::reducer::TaskStatus;
use taskpilot::service::{TOOL_ANSWER, TOOL_SCHEDULE, ToolResponse};
use taskpilot::types::SessionContext;
use taskpilot::workflow::{Component, ComponentId, ComponentName, FeedbackKind};

fn core_with(settings: Settings) -> SessionCore {
    SessionCore::new(
        SessionContext::default(),
        Box::new(settings),
        RuntimeOptions {
            exit_when_idle: true,
        },
    )
}

fn core() -> SessionCore {
    core_with(Settings::in_memory())
}

fn ok(elapsed_ms: u64) -> CommandOutcome {
    CommandOutcome {
        success: true,
        output: String::new(),
        elapsed_ms,
    }
}

/// Submit `command` and answer its classification with `classified`.
///
/// Returns the commands produced by the classification step.
fn submit(core: &mut SessionCore, command: &str, classified: ToolResponse) -> Vec<EngineCommand> {
    let step = core.step(SessionEvent::CommandSubmitted {
        command: command.to_string(),
    });
    let component = match step.commands.as_slice() {
        [EngineCommand::CallService {
            component,
            tool,
            prompt,
        }] => {
            assert_eq!(*tool, TOOL_SCHEDULE);
            assert_eq!(prompt, command);
            *component
        }
        other => panic!("expected a single classification call, got {other:?}"),
    };

    core.step(SessionEvent::ServiceResponded {
        component,
        response: classified,
    })
    .commands
}

fn confirmation(commands: &[EngineCommand]) -> (ComponentId, String) {
    match commands {
        [EngineCommand::PromptConfirmation { component, message }] => (*component, message.clone()),
        other => panic!("expected a confirmation prompt, got {other:?}"),
    }
}

fn run_command(commands: &[EngineCommand]) -> ScheduledCommand {
    match commands {
        [EngineCommand::RunCommand(command)] => command.clone(),
        other => panic!("expected a single command to run, got {other:?}"),
    }
}

#[test]
fn install_and_test_runs_both_commands_in_order() {
    init_tracing();
    let mut core = core();

    let commands = submit(
        &mut core,
        "install and test",
        response("", vec![execute("npm install"), execute("npm test")]),
    );
    let (confirm, message) = confirmation(&commands);
    assert_eq!(message, "Should I run these 2 tasks?");

    let step = core.step(SessionEvent::Confirmed { component: confirm });
    let first = run_command(&step.commands);
    assert_eq!(first.index, 0);
    assert_eq!(first.command, "npm install");

    let step = core.step(SessionEvent::CommandFinished {
        component: first.component,
        index: 0,
        outcome: ok(1000),
    });
    assert!(step.keep_running);
    let second = run_command(&step.commands);
    assert_eq!(second.component, first.component);
    assert_eq!(second.index, 1);
    assert_eq!(second.command, "npm test");

    let step = core.step(SessionEvent::CommandFinished {
        component: first.component,
        index: 1,
        outcome: ok(2000),
    });
    assert!(!step.keep_running);
    assert_eq!(step.commands, vec![EngineCommand::RequestExit]);

    assert_eq!(
        names(core.timeline()),
        vec![
            ComponentName::Command,
            ComponentName::Schedule,
            ComponentName::Confirm,
            ComponentName::Execute
        ]
    );
    match &core.timeline()[3].component {
        Component::Execute(props) => assert_eq!(
            props.state.completion_message.as_deref(),
            Some("Execution completed in 3 seconds.")
        ),
        other => panic!("expected Execute, got {:?}", other.name()),
    }
}

#[test]
fn failing_command_stops_the_batch_and_reports() {
    let mut core = core();

    let commands = submit(
        &mut core,
        "build",
        response("Build", vec![execute("make"), execute("make install")]),
    );
    let (confirm, _) = confirmation(&commands);
    let first = run_command(&core.step(SessionEvent::Confirmed { component: confirm }).commands);

    let step = core.step(SessionEvent::CommandFinished {
        component: first.component,
        index: 0,
        outcome: CommandOutcome {
            success: false,
            output: "make: *** No targets.  Stop.\n".into(),
            elapsed_ms: 10,
        },
    });

    assert_eq!(step.commands, vec![EngineCommand::RequestExit]);
    let execute = core
        .timeline()
        .iter()
        .find_map(|d| match &d.component {
            Component::Execute(p) => Some(p.clone()),
            _ => None,
        })
        .expect("execute on timeline");
    let statuses: Vec<_> = execute.state.tasks.iter().map(|t| t.status).collect();
    assert_eq!(statuses, vec![TaskStatus::Failed, TaskStatus::Cancelled]);
    assert_eq!(
        feedback(core.timeline()),
        vec![(
            FeedbackKind::Failed,
            "make: make: *** No targets.  Stop.".to_string()
        )]
    );
}

#[test]
fn task_failure_is_reported_before_feedback_queued_behind_the_batch() {
    let mut core = core();

    let commands = submit(
        &mut core,
        "build and document",
        response(
            "",
            vec![
                execute("make"),
                group("Docs", vec![execute("mkdocs build"), answer("Where do docs go?")]),
            ],
        ),
    );
    let (confirm, _) = confirmation(&commands);
    let first = run_command(&core.step(SessionEvent::Confirmed { component: confirm }).commands);

    core.step(SessionEvent::CommandFinished {
        component: first.component,
        index: 0,
        outcome: CommandOutcome {
            success: false,
            output: "no makefile".into(),
            elapsed_ms: 5,
        },
    });

    assert_eq!(
        names(core.timeline()),
        vec![
            ComponentName::Command,
            ComponentName::Schedule,
            ComponentName::Confirm,
            ComponentName::Execute,
            ComponentName::Feedback,
            ComponentName::Feedback
        ]
    );
    assert_eq!(
        feedback(core.timeline()),
        vec![
            (FeedbackKind::Failed, "make: no makefile".to_string()),
            (
                FeedbackKind::Failed,
                "Cannot route 'Docs': mixed task types (execute, answer)".to_string()
            ),
        ]
    );
}

#[test]
fn abort_during_execution_kills_the_command_and_reports() {
    let mut core = core();

    let commands = submit(&mut core, "wait", response("", vec![execute("sleep 30"), execute("ls")]));
    let (confirm, _) = confirmation(&commands);
    let running = run_command(&core.step(SessionEvent::Confirmed { component: confirm }).commands);

    let step = core.step(SessionEvent::AbortRequested);
    assert_eq!(
        step.commands,
        vec![
            EngineCommand::CancelCommand(running.component),
            EngineCommand::RequestExit
        ]
    );

    assert_eq!(
        feedback(core.timeline()),
        vec![(
            FeedbackKind::Aborted,
            "The execution was cancelled.".to_string()
        )]
    );

    // A result arriving after the abort changes nothing.
    let before = core.timeline().to_vec();
    core.step(SessionEvent::CommandFinished {
        component: running.component,
        index: 0,
        outcome: ok(5),
    });
    assert_eq!(core.timeline(), before.as_slice());
}

#[test]
fn declining_confirmation_runs_nothing() {
    let mut core = core();

    let commands = submit(&mut core, "clean", response("", vec![execute("rm -rf target")]));
    let (confirm, message) = confirmation(&commands);
    assert_eq!(message, "Should I run this task?");

    let step = core.step(SessionEvent::Cancelled { component: confirm });

    assert!(
        !step
            .commands
            .iter()
            .any(|c| matches!(c, EngineCommand::RunCommand(_)))
    );
    assert!(!step.keep_running);
    assert_eq!(
        names(core.timeline()),
        vec![
            ComponentName::Command,
            ComponentName::Schedule,
            ComponentName::Confirm,
            ComponentName::Feedback
        ]
    );
}

#[test]
fn missing_settings_are_collected_persisted_then_used() {
    let mut core = core_with(SettingsBuilder::new().build());

    let commands = submit(
        &mut core,
        "deploy",
        response("", vec![execute("deploy").with_config(["project.path"])]),
    );
    let (confirm, _) = confirmation(&commands);

    let step = core.step(SessionEvent::Confirmed { component: confirm });
    let validate = match step.commands.as_slice() {
        [EngineCommand::CollectSettings { component, fields }] => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].key, "project.path");
            *component
        }
        other => panic!("expected settings prompt, got {other:?}"),
    };

    let step = core.step(SessionEvent::SettingsProvided {
        component: validate,
        values: vec![("project.path".into(), "/srv/app".into())],
    });

    assert_eq!(step.commands[0], EngineCommand::PersistSettings);
    assert_eq!(run_command(&step.commands[1..]).command, "deploy");
    assert_eq!(
        core.config().value("project.path").as_deref(),
        Some("/srv/app")
    );
}

#[test]
fn choices_are_prompted_then_the_request_is_refined() {
    let mut core = core();

    let commands = submit(
        &mut core,
        "deploy",
        response(
            "Deploy",
            vec![
                define("Which environment?", &["staging", "production"]),
                define("Notify?", &["yes", "no"]),
            ],
        ),
    );
    let schedule = match commands.as_slice() {
        [EngineCommand::PromptSelection {
            component,
            group: 0,
            options,
        }] => {
            assert_eq!(options.prompt, "Which environment?");
            *component
        }
        other => panic!("expected first selection prompt, got {other:?}"),
    };

    let step = core.step(SessionEvent::OptionSelected {
        component: schedule,
        group: 0,
        option: 0,
    });
    assert!(matches!(
        step.commands.as_slice(),
        [EngineCommand::PromptSelection { group: 1, .. }]
    ));

    let step = core.step(SessionEvent::OptionSelected {
        component: schedule,
        group: 1,
        option: 1,
    });
    let refinement = match step.commands.as_slice() {
        [EngineCommand::CallService {
            component,
            tool,
            prompt,
        }] => {
            assert_eq!(*tool, TOOL_SCHEDULE);
            assert_eq!(
                prompt,
                "deploy\n\nSelected options:\n- Which environment?: staging\n- Notify?: no"
            );
            *component
        }
        other => panic!("expected refinement call, got {other:?}"),
    };

    let step = core.step(SessionEvent::ServiceResponded {
        component: refinement,
        response: response("Deploy to staging", vec![execute("deploy staging")]),
    });
    let (_, message) = confirmation(&step.commands);
    assert_eq!(message, "Should I run this task?");
    assert_eq!(
        names(core.timeline()),
        vec![
            ComponentName::Command,
            ComponentName::Schedule,
            ComponentName::Refinement
        ]
    );
}

#[test]
fn questions_are_answered_through_the_service() {
    let mut core = core();

    let commands = submit(&mut core, "what is rust", response("", vec![answer("What is Rust?")]));
    let (confirm, message) = confirmation(&commands);
    assert_eq!(message, "Should I answer this question?");

    let step = core.step(SessionEvent::Confirmed { component: confirm });
    let component = match step.commands.as_slice() {
        [EngineCommand::CallService {
            component,
            tool,
            prompt,
        }] => {
            assert_eq!(*tool, TOOL_ANSWER);
            assert_eq!(prompt, "What is Rust?");
            *component
        }
        other => panic!("expected answer call, got {other:?}"),
    };

    let step = core.step(SessionEvent::ServiceResponded {
        component,
        response: response("A systems programming language.", vec![]),
    });
    assert!(!step.keep_running);
    match &core.timeline().last().expect("timeline").component {
        Component::Answer(props) => assert_eq!(
            props.state.as_deref(),
            Some("A systems programming language.")
        ),
        other => panic!("expected Answer, got {:?}", other.name()),
    }
}

#[test]
fn classification_failure_is_reported_without_execution() {
    let mut core = core();

    let step = core.step(SessionEvent::CommandSubmitted {
        command: "do it".into(),
    });
    let component = match step.commands.as_slice() {
        [EngineCommand::CallService { component, .. }] => *component,
        other => panic!("expected classification call, got {other:?}"),
    };

    let step = core.step(SessionEvent::ServiceFailed {
        component,
        error: "service unavailable".into(),
    });

    assert!(!step.keep_running);
    assert_eq!(
        feedback(core.timeline()),
        vec![(
            FeedbackKind::Failed,
            "Could not understand the request: service unavailable".to_string()
        )]
    );
}

#[test]
fn nothing_to_schedule_leaves_a_message() {
    let mut core = core();
    submit(&mut core, "hello", response("", vec![]));

    assert!(core.is_idle());
    match &core.timeline().last().expect("timeline").component {
        Component::Message(text) => assert_eq!(text, NOTHING_TO_DO),
        other => panic!("expected Message, got {:?}", other.name()),
    }
}

#[test]
fn abort_while_idle_stops_the_session() {
    let mut core = core();
    let step = core.step(SessionEvent::AbortRequested);
    assert!(!step.keep_running);
    assert!(step.commands.is_empty());
}

#[test]
fn events_for_unknown_components_are_ignored() {
    let mut core = core();
    submit(&mut core, "ls", response("", vec![execute("ls")]));
    let before = core.timeline().to_vec();

    let step = core.step(SessionEvent::Confirmed {
        component: ComponentId(999),
    });

    assert!(step.commands.is_empty());
    assert!(step.keep_running);
    assert_eq!(core.timeline(), before.as_slice());
}
