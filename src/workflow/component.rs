// src/workflow/component.rs

//! Component definitions: the units the workflow queue sequences.
//!
//! Each [`Component`] variant carries its own props (fixed at enqueue time)
//! and, for stateful components, a `state` field that only the component's
//! own handler mutates.

use std::fmt;

use crate::exec::reducer::{ExecutionState, TaskStatus, format_duration};
use crate::router::Operation;
use crate::task::{Task, TaskType};

/// Stable identifier of a component definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a definition: `Awaiting -> Active -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentStatus {
    Awaiting,
    Active,
    Done,
}

/// Discriminator of a [`Component`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentName {
    Command,
    Schedule,
    Confirm,
    Refinement,
    Config,
    Validate,
    Execute,
    Answer,
    Introspect,
    Feedback,
    Message,
    Debug,
}

/// The user's request, active while the language service classifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandProps {
    pub command: String,
}

/// One `Define` task presented as a list of options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionGroup {
    pub prompt: String,
    pub options: Vec<String>,
}

/// Selection progress across the option groups of a schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleState {
    pub groups: Vec<OptionGroup>,
    pub selections: Vec<Option<usize>>,
}

impl ScheduleState {
    /// Build one option group per `Define` task, depth first.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let groups: Vec<OptionGroup> = crate::task::leaves(tasks)
            .into_iter()
            .filter(|t| t.kind == TaskType::Define)
            .map(|t| OptionGroup {
                prompt: t.action.clone(),
                options: t.options().to_vec(),
            })
            .collect();
        let selections = vec![None; groups.len()];
        Self { groups, selections }
    }

    /// Record the user's choice for one group.
    ///
    /// Returns `false` if the group or option does not exist.
    pub fn select(&mut self, group: usize, option: usize) -> bool {
        let valid = self
            .groups
            .get(group)
            .is_some_and(|g| option < g.options.len());
        if valid {
            self.selections[group] = Some(option);
        }
        valid
    }

    /// Index of the first group still waiting for a choice.
    pub fn current_group(&self) -> Option<usize> {
        self.selections.iter().position(Option::is_none)
    }

    pub fn is_resolved(&self) -> bool {
        self.current_group().is_none()
    }

    /// `(prompt, chosen option)` pairs for every resolved group.
    pub fn chosen(&self) -> Vec<(&str, &str)> {
        self.groups
            .iter()
            .zip(&self.selections)
            .filter_map(|(group, sel)| {
                sel.and_then(|i| group.options.get(i))
                    .map(|opt| (group.prompt.as_str(), opt.as_str()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleProps {
    pub message: String,
    pub tasks: Vec<Task>,
    pub original_command: String,
    /// Resolve immediately with `tasks`; no user interaction.
    pub auto_confirm: bool,
    pub state: ScheduleState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmProps {
    pub message: String,
    pub tasks: Vec<Task>,
    pub operation: Operation,
    /// Message of the schedule being confirmed, handed on to executors.
    pub schedule_message: String,
}

/// Re-classification of the request after the user resolved its choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementProps {
    pub prompt: String,
    pub original_command: String,
}

/// A configuration key the user is asked to provide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingField {
    pub key: String,
    pub label: String,
}

/// Shared payload of `Config` and `Validate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsProps {
    pub fields: Vec<SettingField>,
    /// Values provided by the user, in field order.
    pub state: Vec<(String, String)>,
}

impl SettingsProps {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteProps {
    pub label: Option<String>,
    pub tasks: Vec<Task>,
    pub upcoming: Vec<String>,
    pub state: ExecutionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerProps {
    pub question: String,
    pub upcoming: Vec<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntrospectState {
    pub message: String,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrospectProps {
    pub tasks: Vec<Task>,
    pub upcoming: Vec<String>,
    pub state: Option<IntrospectState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Succeeded,
    Aborted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackProps {
    pub kind: FeedbackKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugProps {
    pub title: String,
    pub lines: Vec<String>,
}

/// A scheduled unit of interaction or work, one payload per name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Command(CommandProps),
    Schedule(ScheduleProps),
    Confirm(ConfirmProps),
    Refinement(RefinementProps),
    Config(SettingsProps),
    Validate(SettingsProps),
    Execute(ExecuteProps),
    Answer(AnswerProps),
    Introspect(IntrospectProps),
    Feedback(FeedbackProps),
    Message(String),
    Debug(DebugProps),
}

impl Component {
    pub fn name(&self) -> ComponentName {
        match self {
            Component::Command(_) => ComponentName::Command,
            Component::Schedule(_) => ComponentName::Schedule,
            Component::Confirm(_) => ComponentName::Confirm,
            Component::Refinement(_) => ComponentName::Refinement,
            Component::Config(_) => ComponentName::Config,
            Component::Validate(_) => ComponentName::Validate,
            Component::Execute(_) => ComponentName::Execute,
            Component::Answer(_) => ComponentName::Answer,
            Component::Introspect(_) => ComponentName::Introspect,
            Component::Feedback(_) => ComponentName::Feedback,
            Component::Message(_) => ComponentName::Message,
            Component::Debug(_) => ComponentName::Debug,
        }
    }

    /// Components without an interactive phase go straight to the timeline
    /// when they reach the head of the queue.
    pub fn is_interactive(&self) -> bool {
        !matches!(
            self,
            Component::Feedback(_) | Component::Message(_) | Component::Debug(_)
        )
    }

    pub fn feedback(kind: FeedbackKind, message: impl Into<String>) -> Self {
        Component::Feedback(FeedbackProps {
            kind,
            message: message.into(),
        })
    }

    /// Feedback for a cancelled operation.
    pub fn aborted(reason: &str) -> Self {
        Self::feedback(FeedbackKind::Aborted, format!("The {reason} was cancelled."))
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::feedback(FeedbackKind::Failed, message)
    }
}

/// A component plus its identity and lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDefinition {
    pub id: ComponentId,
    pub status: ComponentStatus,
    pub component: Component,
}

impl ComponentDefinition {
    pub fn name(&self) -> ComponentName {
        self.component.name()
    }
}

impl fmt::Display for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.component, f)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Command(p) => write!(f, "> {}", p.command),
            Component::Schedule(p) => {
                write!(f, "{}", p.message)?;
                write_tasks(f, &p.tasks, 1)
            }
            Component::Confirm(p) => write!(f, "{}", p.message),
            Component::Refinement(p) => write!(f, "Refining: {}", first_line(&p.prompt)),
            Component::Config(p) | Component::Validate(p) => {
                if p.state.is_empty() {
                    let keys: Vec<&str> = p.keys().collect();
                    return write!(f, "Settings required: {}", keys.join(", "));
                }
                let mut first = true;
                for (key, value) in &p.state {
                    if !first {
                        writeln!(f)?;
                    }
                    first = false;
                    write!(f, "Set {key} = {value}")?;
                }
                Ok(())
            }
            Component::Execute(p) => write_execution(f, p),
            Component::Answer(p) => {
                write!(f, "{}", p.question)?;
                if let Some(answer) = &p.state {
                    write!(f, "\n{answer}")?;
                }
                Ok(())
            }
            Component::Introspect(p) => match &p.state {
                Some(state) => {
                    write!(f, "{}", state.message)?;
                    for cap in &state.capabilities {
                        write!(f, "\n  - {cap}")?;
                    }
                    Ok(())
                }
                None => write!(f, "Describing capabilities"),
            },
            Component::Feedback(p) => match p.kind {
                FeedbackKind::Succeeded | FeedbackKind::Aborted => write!(f, "{}", p.message),
                FeedbackKind::Failed => write!(f, "Error: {}", p.message),
            },
            Component::Message(text) => write!(f, "{text}"),
            Component::Debug(p) => {
                write!(f, "[debug] {}", p.title)?;
                for line in &p.lines {
                    write!(f, "\n[debug]   {line}")?;
                }
                Ok(())
            }
        }
    }
}

fn write_tasks(f: &mut fmt::Formatter<'_>, tasks: &[Task], depth: usize) -> fmt::Result {
    for task in tasks {
        write!(f, "\n{}- {} ({})", "  ".repeat(depth), task.action, task.kind)?;
        if task.is_group() {
            write_tasks(f, &task.subtasks, depth + 1)?;
        }
    }
    Ok(())
}

fn write_execution(f: &mut fmt::Formatter<'_>, p: &ExecuteProps) -> fmt::Result {
    let state = &p.state;
    match &p.label {
        Some(label) => write!(f, "{label}")?,
        None => write!(f, "{}", state.title())?,
    }
    for record in &state.tasks {
        let marker = match record.status {
            TaskStatus::Pending => "pending",
            TaskStatus::Success => "done",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "\n  [{marker}] {}", record.label)?;
        if record.status == TaskStatus::Success {
            write!(f, " ({})", format_duration(record.elapsed_ms))?;
        }
        for line in record.output.trim_end().lines().filter(|l| !l.is_empty()) {
            write!(f, "\n      {line}")?;
        }
    }
    if let Some(done) = &state.completion_message {
        write!(f, "\n{done}")?;
    }
    Ok(())
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or_default()
}
