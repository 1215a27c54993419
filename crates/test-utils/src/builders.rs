#![allow(dead_code)]

use taskpilot::config::{ConfigStore, Settings};
use taskpilot::service::ToolResponse;
use taskpilot::task::{Task, TaskParams, TaskType};

/// `Execute` leaf whose command is its action.
pub fn execute(action: &str) -> Task {
    Task::new(action, TaskType::Execute)
}

pub fn answer(question: &str) -> Task {
    Task::new(question, TaskType::Answer)
}

pub fn introspect(action: &str) -> Task {
    Task::new(action, TaskType::Introspect)
}

/// `Define` leaf offering `options`.
pub fn define(action: &str, options: &[&str]) -> Task {
    Task::new(action, TaskType::Define).with_params(TaskParams::Options {
        options: options.iter().map(|o| o.to_string()).collect(),
    })
}

/// `Config` leaf targeting `key`.
pub fn config_task(action: &str, key: &str) -> Task {
    Task::new(action, TaskType::Config).with_params(TaskParams::Key {
        key: key.to_string(),
    })
}

pub fn group(action: &str, subtasks: Vec<Task>) -> Task {
    Task::group(action, subtasks)
}

pub fn response(message: &str, tasks: Vec<Task>) -> ToolResponse {
    ToolResponse {
        message: message.to_string(),
        tasks,
    }
}

/// Builder for in-memory `Settings` to simplify test setup.
pub struct SettingsBuilder {
    values: Vec<(String, String)>,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.values.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_debug(self, level: &str) -> Self {
        self.with_value("session.debug", level)
    }

    pub fn build(self) -> Settings {
        let mut settings = Settings::in_memory();
        for (key, value) in &self.values {
            settings
                .set_value(key, value)
                .expect("Failed to build valid settings from builder");
        }
        settings
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
