// src/service.rs

//! Language service boundary.
//!
//! The session only ever talks to a [`LanguageService`]: hand it a prompt and
//! the name of a tool, get back a message plus classified tasks.
//!
//! Tools:
//! - [`TOOL_SCHEDULE`]: classify a request into tasks.
//! - [`TOOL_ANSWER`]: answer one question (the message is the answer).
//! - [`TOOL_INTROSPECT`]: describe capabilities (one task per capability).
//!
//! [`PlanService`] is the offline implementation shipped with the binary. It
//! replays a classification loaded from a JSON plan file.

use std::collections::BTreeMap;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{Result, TaskpilotError};
use crate::task::{Task, TaskType};

pub const TOOL_SCHEDULE: &str = "schedule";
pub const TOOL_ANSWER: &str = "answer";
pub const TOOL_INTROSPECT: &str = "introspect";

/// Marker separating a request from the choices made for it in a
/// refinement prompt.
pub const SELECTED_OPTIONS_HEADER: &str = "Selected options:";

/// What a tool call produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Trait abstracting the language model client.
pub trait LanguageService: Send + Sync {
    fn process_with_tool<'a>(
        &'a self,
        prompt: &'a str,
        tool: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResponse>> + Send + 'a>>;
}

/// Plan file consumed by [`PlanService`]:
///
/// ```json
/// {
///   "message": "Install and test",
///   "tasks": [
///     { "action": "npm install", "type": "execute" },
///     { "action": "npm test", "type": "execute" }
///   ],
///   "answers": { "What is Rust?": "A systems programming language." }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlanFile {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
}

/// Capabilities reported by the `introspect` tool.
const CAPABILITIES: &[&str] = &[
    "Run shell commands, one batch at a time",
    "Answer questions",
    "Ask you to choose between options before acting",
    "Read and update settings",
    "Describe what I can do",
];

/// Offline language service.
///
/// - `schedule` returns the plan. With no plan loaded, the request itself is
///   treated as a single shell command. For a refinement prompt, every
///   `Define` task whose question was answered is replaced by an `Execute`
///   task running the chosen option.
/// - `answer` looks the question up in the plan's `answers`.
/// - `introspect` returns the built-in capability list.
#[derive(Debug, Clone, Default)]
pub struct PlanService {
    plan: Option<PlanFile>,
}

impl PlanService {
    pub fn new(plan: PlanFile) -> Self {
        Self { plan: Some(plan) }
    }

    /// Service without a plan: every request is run as typed.
    pub fn passthrough() -> Self {
        Self { plan: None }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let plan: PlanFile = serde_json::from_str(&contents)?;
        info!(path = %path.display(), tasks = plan.tasks.len(), "plan loaded");
        Ok(Self::new(plan))
    }

    fn schedule(&self, prompt: &str) -> ToolResponse {
        let (request, choices) = split_refinement(prompt);

        let Some(plan) = &self.plan else {
            debug!(%request, "no plan loaded; running request as a command");
            return ToolResponse {
                message: format!("Run `{request}`"),
                tasks: vec![Task::new(request, TaskType::Execute)],
            };
        };

        if choices.is_empty() {
            return ToolResponse {
                message: plan.message.clone(),
                tasks: plan.tasks.clone(),
            };
        }

        debug!(choices = choices.len(), "resolving plan choices");
        ToolResponse {
            message: plan.message.clone(),
            tasks: resolve_choices(&plan.tasks, &choices),
        }
    }

    fn answer(&self, question: &str) -> Result<ToolResponse> {
        let question = question.trim();
        self.plan
            .as_ref()
            .and_then(|plan| plan.answers.get(question))
            .map(|answer| ToolResponse {
                message: answer.clone(),
                tasks: Vec::new(),
            })
            .ok_or_else(|| {
                TaskpilotError::ServiceError(format!("no answer available for '{question}'"))
            })
    }

    fn introspect(&self) -> ToolResponse {
        ToolResponse {
            message: "Here is what I can do:".to_string(),
            tasks: CAPABILITIES
                .iter()
                .map(|cap| Task::new(*cap, TaskType::Introspect))
                .collect(),
        }
    }
}

impl LanguageService for PlanService {
    fn process_with_tool<'a>(
        &'a self,
        prompt: &'a str,
        tool: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResponse>> + Send + 'a>> {
        Box::pin(async move {
            debug!(tool, "plan service call");
            match tool {
                TOOL_SCHEDULE => Ok(self.schedule(prompt)),
                TOOL_ANSWER => self.answer(prompt),
                TOOL_INTROSPECT => Ok(self.introspect()),
                other => Err(TaskpilotError::ServiceError(format!("unknown tool '{other}'"))),
            }
        })
    }
}

/// Split a refinement prompt into the request and its `(question, option)`
/// pairs. A plain request yields no pairs.
fn split_refinement(prompt: &str) -> (String, Vec<(String, String)>) {
    let Some((request, rest)) = prompt.split_once(SELECTED_OPTIONS_HEADER) else {
        return (prompt.trim().to_string(), Vec::new());
    };

    let choices = rest
        .lines()
        .filter_map(|line| line.trim().strip_prefix("- "))
        .filter_map(|line| line.rsplit_once(": "))
        .map(|(q, o)| (q.trim().to_string(), o.trim().to_string()))
        .collect();

    (request.trim().to_string(), choices)
}

fn resolve_choices(tasks: &[Task], choices: &[(String, String)]) -> Vec<Task> {
    tasks
        .iter()
        .map(|task| {
            if task.is_group() {
                let mut group = task.clone();
                group.subtasks = resolve_choices(&task.subtasks, choices);
                return group;
            }
            if task.kind != TaskType::Define {
                return task.clone();
            }
            match choices.iter().find(|(q, _)| *q == task.action.trim()) {
                Some((_, option)) => {
                    Task::new(option.clone(), TaskType::Execute).with_config(task.config.clone())
                }
                None => task.clone(),
            }
        })
        .collect()
}
