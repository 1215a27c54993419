// src/router/dispatch.rs

//! Dispatch of a confirmed task list to executor definitions.
//!
//! Ordering of what gets enqueued:
//! 1. at most one `Validate`, covering every missing configuration key;
//! 2. executor units in task order, where
//!    - all `Config` leaves merge into one `Config` at the first one's spot,
//!    - each group becomes one unit (an `Execute` batch for command groups),
//!    - adjacent standalone `Execute` leaves share one batch,
//!    - adjacent standalone `Introspect` leaves share one definition,
//!    - every `Answer` leaf gets its own definition;
//! 3. groups that cannot be routed are reported in place via `on_error`.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::config::ConfigStore;
use crate::exec::reducer::ExecutionState;
use crate::task::{Task, TaskType, leaves};
use crate::workflow::component::{
    AnswerProps, ExecuteProps, IntrospectProps, SettingField, SettingsProps,
};
use crate::workflow::{Component, RequestHandlers, WorkflowHandlers};

/// One entry of the execution pipeline before it is enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Unit {
    Execute { label: Option<String>, tasks: Vec<Task> },
    Answer { question: String },
    Introspect { tasks: Vec<Task> },
    Config { actions: Vec<String> },
    Error { message: String },
}

impl Unit {
    /// Labels this unit contributes to the `upcoming` preview.
    fn labels(&self) -> Vec<String> {
        match self {
            Unit::Execute {
                label: Some(label), ..
            } => vec![label.clone()],
            Unit::Execute { label: None, tasks } | Unit::Introspect { tasks } => {
                tasks.iter().map(|t| t.action.clone()).collect()
            }
            Unit::Answer { question } => vec![question.clone()],
            Unit::Config { actions } => actions.clone(),
            Unit::Error { .. } => Vec::new(),
        }
    }
}

pub(crate) fn dispatch_confirmed<H>(
    config: &mut dyn ConfigStore,
    tasks: Vec<Task>,
    schedule_message: &str,
    handlers: &mut H,
) where
    H: WorkflowHandlers + RequestHandlers,
{
    let tasks: Vec<Task> = tasks
        .into_iter()
        .filter(|t| !t.kind.is_droppable())
        .collect();

    let config_fields = config_fields(config, &tasks);
    let configured: HashSet<&str> = config_fields.iter().map(|f| f.key.as_str()).collect();

    let missing: Vec<String> = config
        .missing_keys(&tasks)
        .into_iter()
        .filter(|key| !configured.contains(key.as_str()))
        .collect();

    if !missing.is_empty() {
        debug!(?missing, "missing configuration; enqueueing validation");
        let fields = missing
            .into_iter()
            .map(|key| SettingField {
                label: config.label(&key).unwrap_or_else(|| key.clone()),
                key,
            })
            .collect();
        handlers.add_to_queue(Component::Validate(SettingsProps {
            fields,
            state: Vec::new(),
        }));
    }

    let units = plan_units(&tasks);
    let labels: Vec<Vec<String>> = units.iter().map(Unit::labels).collect();
    let mut config_fields = Some(config_fields);

    for (i, unit) in units.into_iter().enumerate() {
        let upcoming: Vec<String> = labels[i + 1..].iter().flatten().cloned().collect();
        match unit {
            Unit::Execute { label, tasks } => {
                let state = ExecutionState::new(
                    &tasks,
                    schedule_message,
                    label.clone().unwrap_or_default(),
                );
                handlers.add_to_queue(Component::Execute(ExecuteProps {
                    label,
                    tasks,
                    upcoming,
                    state,
                }));
            }
            Unit::Answer { question } => {
                handlers.add_to_queue(Component::Answer(AnswerProps {
                    question,
                    upcoming,
                    state: None,
                }));
            }
            Unit::Introspect { tasks } => {
                handlers.add_to_queue(Component::Introspect(IntrospectProps {
                    tasks,
                    upcoming,
                    state: None,
                }));
            }
            Unit::Config { .. } => {
                if let Some(fields) = config_fields.take() {
                    handlers.add_to_queue(Component::Config(SettingsProps {
                        fields,
                        state: Vec::new(),
                    }));
                }
            }
            Unit::Error { message } => handlers.on_error(message),
        }
    }
}

/// One field per distinct key targeted by a `Config` leaf anywhere in the
/// confirmed set. Labels of keys outside the schema are cached.
fn config_fields(config: &mut dyn ConfigStore, tasks: &[Task]) -> Vec<SettingField> {
    let schema = config.known_schema_keys();
    let mut seen = BTreeSet::new();
    let mut fields = Vec::new();

    for task in leaves(tasks).into_iter().filter(|t| t.kind == TaskType::Config) {
        let key = task.config_key().to_string();
        if key.is_empty() || !seen.insert(key.clone()) {
            continue;
        }
        let label = if schema.contains(&key) {
            config.label(&key).unwrap_or_else(|| key.clone())
        } else {
            config.cache_label(&key, &task.action);
            task.action.clone()
        };
        fields.push(SettingField { key, label });
    }
    fields
}

fn plan_units(tasks: &[Task]) -> Vec<Unit> {
    let mut units: Vec<Unit> = Vec::new();
    let mut config_placed = false;

    let mut place_config = |units: &mut Vec<Unit>, action: &str| {
        if config_placed {
            if let Some(Unit::Config { actions }) =
                units.iter_mut().find(|u| matches!(u, Unit::Config { .. }))
            {
                actions.push(action.to_string());
            }
        } else {
            config_placed = true;
            units.push(Unit::Config {
                actions: vec![action.to_string()],
            });
        }
    };

    for task in tasks {
        match task.kind {
            TaskType::Group => {
                let subtasks: Vec<Task> = leaves(&task.subtasks)
                    .into_iter()
                    .filter(|t| !t.kind.is_droppable())
                    .cloned()
                    .collect();
                let Some(kind) = shared_kind(&subtasks) else {
                    if subtasks.is_empty() {
                        debug!(group = %task.action, "group has nothing routable; skipping");
                    } else {
                        units.push(group_error(&task.action, &subtasks));
                    }
                    continue;
                };
                match kind {
                    TaskType::Execute => units.push(Unit::Execute {
                        label: Some(task.action.clone()),
                        tasks: subtasks,
                    }),
                    TaskType::Answer => units.extend(subtasks.into_iter().map(|t| Unit::Answer {
                        question: t.action,
                    })),
                    TaskType::Introspect => units.push(Unit::Introspect { tasks: subtasks }),
                    TaskType::Config => {
                        for sub in &subtasks {
                            place_config(&mut units, &sub.action);
                        }
                    }
                    other => units.push(Unit::Error {
                        message: format!(
                            "Cannot route '{}': unsupported task type ({other})",
                            task.action
                        ),
                    }),
                }
            }
            TaskType::Execute => match units.last_mut() {
                Some(Unit::Execute { label: None, tasks }) => tasks.push(task.clone()),
                _ => units.push(Unit::Execute {
                    label: None,
                    tasks: vec![task.clone()],
                }),
            },
            TaskType::Introspect => match units.last_mut() {
                Some(Unit::Introspect { tasks }) => tasks.push(task.clone()),
                _ => units.push(Unit::Introspect {
                    tasks: vec![task.clone()],
                }),
            },
            TaskType::Answer => units.push(Unit::Answer {
                question: task.action.clone(),
            }),
            TaskType::Config => place_config(&mut units, &task.action),
            TaskType::Ignore | TaskType::Discard => {}
            TaskType::Define | TaskType::Schedule => {
                warn!(task = %task.action, kind = %task.kind, "unroutable task after confirmation");
                units.push(Unit::Error {
                    message: format!(
                        "Cannot route '{}': unsupported task type ({})",
                        task.action, task.kind
                    ),
                });
            }
        }
    }

    units
}

/// The single type every subtask shares, if any.
fn shared_kind(subtasks: &[Task]) -> Option<TaskType> {
    let first = subtasks.first()?.kind;
    subtasks.iter().all(|t| t.kind == first).then_some(first)
}

fn group_error(action: &str, subtasks: &[Task]) -> Unit {
    let mut kinds: Vec<&str> = Vec::new();
    for task in subtasks {
        let kind = task.kind.as_str();
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    warn!(group = %action, ?kinds, "group mixes task types; not routable");
    Unit::Error {
        message: format!(
            "Cannot route '{action}': mixed task types ({})",
            kinds.join(", ")
        ),
    }
}
