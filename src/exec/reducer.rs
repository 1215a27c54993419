// src/exec/reducer.rs

//! Pure per-batch execution state machine.
//!
//! One `Execute` component owns one [`ExecutionState`]. Every time a command
//! of the batch finishes (or the user aborts), the session core feeds an
//! [`ExecutionEvent`] into [`reduce`] and gets back the next state plus an
//! [`ExecutionAction`] describing what should happen next.
//!
//! Failure policy: the first failing task cancels every task still pending
//! in the batch. There are no retries and no "non-critical" failures.

use tracing::{debug, warn};

use crate::task::Task;

/// Title used when a batch has no summary of its own.
pub const DEFAULT_TITLE: &str = "Execution";

/// Completion text used when a batch has no summary of its own.
pub const DEFAULT_COMPLETION: &str = "Execution completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

/// Progress of a single command inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub label: String,
    pub command: String,
    pub status: TaskStatus,
    pub elapsed_ms: u64,
    pub output: String,
}

impl TaskRecord {
    pub fn from_task(task: &Task) -> Self {
        Self {
            label: task.action.clone(),
            command: task.command().to_string(),
            status: TaskStatus::Pending,
            elapsed_ms: 0,
            output: String::new(),
        }
    }
}

/// State of one batch of commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionState {
    pub tasks: Vec<TaskRecord>,
    pub message: String,
    pub summary: String,
    pub completion_message: Option<String>,
    pub error: Option<String>,
    /// Number of tasks the batch has advanced past.
    pub completed: usize,
}

impl ExecutionState {
    pub fn new(tasks: &[Task], message: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            tasks: tasks.iter().map(TaskRecord::from_task).collect(),
            message: message.into(),
            summary: summary.into(),
            completion_message: None,
            error: None,
            completed: 0,
        }
    }

    /// Summary, or [`DEFAULT_TITLE`] when the summary is blank.
    pub fn title(&self) -> &str {
        non_blank(&self.summary).unwrap_or(DEFAULT_TITLE)
    }

    /// Sum of the elapsed time of every task in the batch.
    pub fn total_elapsed_ms(&self) -> u64 {
        self.tasks.iter().map(|t| t.elapsed_ms).sum()
    }

    /// Index of the first task still waiting to run.
    pub fn next_pending(&self) -> Option<usize> {
        self.tasks
            .iter()
            .position(|t| t.status == TaskStatus::Pending)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }
}

/// Something that happened to the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    TaskSucceeded {
        index: usize,
        elapsed_ms: u64,
        output: String,
    },
    TaskFailed {
        index: usize,
        error: String,
    },
    /// User cancelled the batch mid-flight.
    Aborted,
}

/// What the owner of the batch should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionAction {
    /// Start the task at `index`.
    RunNext { index: usize },
    /// Every task succeeded.
    Completed { message: String },
    /// A task failed; everything after it was cancelled.
    TaskError { index: usize, error: String },
    /// The batch was aborted by the user.
    Cancelled,
    /// The event did not apply to the current state.
    Ignored,
}

/// Result of a single reducer step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducerStep {
    pub state: ExecutionState,
    pub action: ExecutionAction,
    /// Whether the owning component should now complete.
    pub should_complete: bool,
}

/// Apply one event to a batch.
pub fn reduce(state: &ExecutionState, event: ExecutionEvent) -> ReducerStep {
    match event {
        ExecutionEvent::TaskSucceeded {
            index,
            elapsed_ms,
            output,
        } => handle_task_completion(state, index, elapsed_ms, output),
        ExecutionEvent::TaskFailed { index, error } => handle_task_error(state, index, error),
        ExecutionEvent::Aborted => handle_abort(state),
    }
}

/// Mark `index` as succeeded and either advance or finish the batch.
pub fn handle_task_completion(
    state: &ExecutionState,
    index: usize,
    elapsed_ms: u64,
    output: String,
) -> ReducerStep {
    if !is_pending(state, index) {
        return ignored(state, index, "success");
    }

    let mut next = state.clone();
    let record = &mut next.tasks[index];
    record.status = TaskStatus::Success;
    record.elapsed_ms = elapsed_ms;
    record.output = output;

    match next.next_pending() {
        Some(following) => {
            next.completed = index + 1;
            debug!(index, following, "task succeeded; advancing batch");
            ReducerStep {
                state: next,
                action: ExecutionAction::RunNext { index: following },
                should_complete: false,
            }
        }
        None => {
            next.completed = next.tasks.len();
            let summary = non_blank(&next.summary).unwrap_or(DEFAULT_COMPLETION);
            let message = format!(
                "{summary} in {}.",
                format_duration(next.total_elapsed_ms())
            );
            debug!(index, %message, "last task succeeded; batch complete");
            next.completion_message = Some(message.clone());
            ReducerStep {
                state: next,
                action: ExecutionAction::Completed { message },
                should_complete: true,
            }
        }
    }
}

/// Mark `index` as failed and cancel every task still pending.
pub fn handle_task_error(state: &ExecutionState, index: usize, error: String) -> ReducerStep {
    if !is_pending(state, index) {
        return ignored(state, index, "failure");
    }

    let mut next = state.clone();
    next.tasks[index].status = TaskStatus::Failed;
    next.tasks[index].output = error.clone();

    let mut cancelled = 0usize;
    for record in next.tasks.iter_mut() {
        if record.status == TaskStatus::Pending {
            record.status = TaskStatus::Cancelled;
            cancelled += 1;
        }
    }

    next.completion_message = None;
    next.error = None;

    debug!(index, cancelled, "task failed; cancelled remainder of batch");

    ReducerStep {
        state: next,
        action: ExecutionAction::TaskError { index, error },
        should_complete: true,
    }
}

/// Snapshot the batch for a cancellation report.
pub fn handle_abort(state: &ExecutionState) -> ReducerStep {
    let next = ExecutionState {
        tasks: state.tasks.clone(),
        message: state.message.clone(),
        summary: state.summary.clone(),
        completion_message: None,
        error: None,
        completed: state.completed,
    };

    debug!(
        completed = next.completed,
        total = next.tasks.len(),
        "batch aborted"
    );

    ReducerStep {
        state: next,
        action: ExecutionAction::Cancelled,
        should_complete: true,
    }
}

/// Format milliseconds as whole seconds, e.g. `"1 second"`, `"5 seconds"`.
pub fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    if seconds == 1 {
        "1 second".to_string()
    } else {
        format!("{seconds} seconds")
    }
}

fn is_pending(state: &ExecutionState, index: usize) -> bool {
    state
        .tasks
        .get(index)
        .is_some_and(|t| t.status == TaskStatus::Pending)
}

fn ignored(state: &ExecutionState, index: usize, what: &str) -> ReducerStep {
    warn!(index, event = what, "event for task that is not pending; ignoring");
    ReducerStep {
        state: state.clone(),
        action: ExecutionAction::Ignored,
        should_complete: false,
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}
