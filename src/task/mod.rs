// src/task/mod.rs

//! Classified units of user intent.
//!
//! A [`Task`] is what the language service hands back for a request. Leaves
//! describe one piece of work; a `Group` bundles leaves that must run as one
//! batch under a shared label. Tasks carry no behaviour of their own: the
//! router decides what each one turns into.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Kind of work a task describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Run a shell command.
    Execute,
    /// Answer a question.
    Answer,
    /// Describe what the assistant can do.
    Introspect,
    /// Unresolved choice between options; the user must pick one.
    Define,
    /// Change a configuration value.
    Config,
    /// Planning placeholder emitted by the classifier.
    Schedule,
    /// A batch of subtasks sharing one label.
    Group,
    /// Recognised but deliberately not acted upon.
    Ignore,
    /// Noise; dropped without comment.
    Discard,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Execute => "execute",
            TaskType::Answer => "answer",
            TaskType::Introspect => "introspect",
            TaskType::Define => "define",
            TaskType::Config => "config",
            TaskType::Schedule => "schedule",
            TaskType::Group => "group",
            TaskType::Ignore => "ignore",
            TaskType::Discard => "discard",
        }
    }

    /// `Ignore` and `Discard` never reach a handler.
    pub fn is_droppable(self) -> bool {
        matches!(self, TaskType::Ignore | TaskType::Discard)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific payload of a task.
///
/// Encoded in JSON as a plain object; the variant is picked by which field
/// is present:
///
/// ```json
/// { "options": ["staging", "production"] }
/// { "key": "project.path" }
/// { "command": "npm install" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskParams {
    /// Options offered by a `Define` task, in display order.
    Options { options: Vec<String> },
    /// Dotted configuration key targeted by a `Config` task.
    Key { key: String },
    /// Explicit shell command for an `Execute` task.
    Command { command: String },
    #[default]
    None,
}

impl TaskParams {
    pub fn is_none(&self) -> bool {
        matches!(self, TaskParams::None)
    }
}

/// `params` as sent by classifiers: one of the [`TaskParams`] shapes, `null`,
/// or an empty object. The last two mean "no params".
fn params_or_empty<'de, D>(deserializer: D) -> Result<TaskParams, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Empty {}

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Given(TaskParams),
        Empty(Empty),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Given(params) => params,
        Raw::Empty(Empty {}) => TaskParams::None,
    })
}

/// A classified unit of intent, leaf or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub action: String,

    #[serde(rename = "type")]
    pub kind: TaskType,

    #[serde(
        default,
        deserialize_with = "params_or_empty",
        skip_serializing_if = "TaskParams::is_none"
    )]
    pub params: TaskParams,

    /// Dotted configuration keys that are still unset and required before
    /// this task may run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config: Vec<String>,

    /// Only meaningful for `Group`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Task>,
}

impl Task {
    /// Create a leaf task with no params or config requirements.
    pub fn new(action: impl Into<String>, kind: TaskType) -> Self {
        Self {
            action: action.into(),
            kind,
            params: TaskParams::None,
            config: Vec::new(),
            subtasks: Vec::new(),
        }
    }

    /// Create a `Group` task.
    pub fn group(action: impl Into<String>, subtasks: Vec<Task>) -> Self {
        Self {
            action: action.into(),
            kind: TaskType::Group,
            params: TaskParams::None,
            config: Vec::new(),
            subtasks,
        }
    }

    pub fn with_params(mut self, params: TaskParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_config<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn is_group(&self) -> bool {
        self.kind == TaskType::Group
    }

    /// Options of a `Define` task (empty for every other kind).
    pub fn options(&self) -> &[String] {
        match &self.params {
            TaskParams::Options { options } => options,
            _ => &[],
        }
    }

    /// Configuration key targeted by a `Config` task.
    ///
    /// Falls back to the action text when the classifier put the key there.
    pub fn config_key(&self) -> &str {
        match &self.params {
            TaskParams::Key { key } => key,
            _ => self.action.trim(),
        }
    }

    /// Shell command to run for an `Execute` task.
    pub fn command(&self) -> &str {
        match &self.params {
            TaskParams::Command { command } => command,
            _ => &self.action,
        }
    }
}

/// Whether any task in the (possibly nested) list is an unresolved `Define`.
pub fn has_define_task(tasks: &[Task]) -> bool {
    tasks.iter().any(|task| match task.kind {
        TaskType::Define => true,
        TaskType::Group => has_define_task(&task.subtasks),
        _ => false,
    })
}

/// Collect every leaf of a task list, depth first, in order.
pub fn leaves(tasks: &[Task]) -> Vec<&Task> {
    let mut out = Vec::new();
    collect_leaves(tasks, &mut out);
    out
}

fn collect_leaves<'a>(tasks: &'a [Task], out: &mut Vec<&'a Task>) {
    for task in tasks {
        if task.is_group() {
            collect_leaves(&task.subtasks, out);
        } else {
            out.push(task);
        }
    }
}
