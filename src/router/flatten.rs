// src/router/flatten.rs

//! Pure task-list transformations used by the router.

use std::fmt;

use crate::task::{Task, TaskType, leaves};

/// What a confirmed batch does as a whole; used to word confirmation and
/// cancellation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Execution,
    Answer,
    Introspection,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Execution => "execution",
            Operation::Answer => "answer",
            Operation::Introspection => "introspection",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Introspection` if every task introspects (vacuously true for an empty
/// list), else `Answer` if every task answers, else `Execution`.
pub fn operation_name(tasks: &[Task]) -> Operation {
    if tasks.iter().all(|t| t.kind == TaskType::Introspect) {
        Operation::Introspection
    } else if tasks.iter().all(|t| t.kind == TaskType::Answer) {
        Operation::Answer
    } else {
        Operation::Execution
    }
}

/// Remove top-level `Ignore`/`Discard` tasks.
pub fn drop_ignored(tasks: Vec<Task>) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|t| !t.kind.is_droppable())
        .collect()
}

/// Collapse nested groups while keeping each top-level group as one entry.
///
/// - Leaves pass through unchanged.
/// - A top-level group keeps its own fields; its subtasks become the flat
///   list of every leaf underneath it, in order.
/// - Configuration keys required by a collapsed nested group move up to the
///   top-level group, deduplicated in first-seen order.
/// - Groups with no leaves underneath are dropped.
///
/// The result is a fixed point: flattening it again changes nothing.
pub fn flatten_tasks(tasks: &[Task]) -> Vec<Task> {
    tasks
        .iter()
        .filter_map(|task| {
            if !task.is_group() {
                return Some(task.clone());
            }
            let subtasks: Vec<Task> = leaves(&task.subtasks).into_iter().cloned().collect();
            if subtasks.is_empty() {
                return None;
            }
            let mut config = Vec::new();
            merge_keys(&mut config, &task.config);
            collect_group_config(&task.subtasks, &mut config);
            Some(Task {
                action: task.action.clone(),
                kind: task.kind,
                params: task.params.clone(),
                config,
                subtasks,
            })
        })
        .collect()
}

/// Keys of every nested group that still has work underneath it.
fn collect_group_config(tasks: &[Task], config: &mut Vec<String>) {
    for task in tasks.iter().filter(|t| t.is_group()) {
        if leaves(&task.subtasks).is_empty() {
            continue;
        }
        merge_keys(config, &task.config);
        collect_group_config(&task.subtasks, config);
    }
}

fn merge_keys(config: &mut Vec<String>, keys: &[String]) {
    for key in keys {
        if !config.contains(key) {
            config.push(key.clone());
        }
    }
}
