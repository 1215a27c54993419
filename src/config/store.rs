// src/config/store.rs

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::fs;

use tracing::{debug, info};

use crate::config::model::{LABELS_TABLE, SCHEMA_KEYS, Settings};
use crate::errors::{Result, TaskpilotError};
use crate::task::Task;
use crate::types::DebugLevel;

/// Settings as seen by the router and the session core.
pub trait ConfigStore: Send + Debug {
    /// Current value of a dotted path, rendered as text.
    fn value(&self, path: &str) -> Option<String>;

    fn set_value(&mut self, path: &str, value: &str) -> Result<()>;

    /// Keys defined by the application's own schema.
    fn known_schema_keys(&self) -> BTreeSet<String>;

    /// Human label for a key: cached label, schema label, or `None`.
    fn label(&self, path: &str) -> Option<String>;

    /// Remember a human label for a key the schema does not know.
    fn cache_label(&mut self, path: &str, label: &str);

    /// Write the settings wherever they live. No-op for in-memory stores.
    fn persist(&self) -> Result<()>;

    /// Configuration keys required by `tasks` (recursively through groups)
    /// that still have no value, deduplicated in first-seen order.
    fn missing_keys(&self, tasks: &[Task]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut missing = Vec::new();
        collect_required(tasks, &mut |key| {
            if seen.insert(key.to_string()) && self.value(key).is_none() {
                missing.push(key.to_string());
            }
        });
        missing
    }
}

fn collect_required(tasks: &[Task], visit: &mut dyn FnMut(&str)) {
    for task in tasks {
        for key in &task.config {
            visit(key);
        }
        collect_required(&task.subtasks, visit);
    }
}

impl ConfigStore for Settings {
    fn value(&self, path: &str) -> Option<String> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.values.get(first)?;
        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }
        match current {
            toml::Value::String(s) => Some(s.clone()),
            toml::Value::Table(_) => None,
            other => Some(other.to_string()),
        }
    }

    fn set_value(&mut self, path: &str, value: &str) -> Result<()> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(TaskpilotError::ConfigError(format!(
                "invalid settings key '{path}'"
            )));
        }
        if segments[0] == LABELS_TABLE {
            return Err(TaskpilotError::ConfigError(format!(
                "'{LABELS_TABLE}' is reserved and cannot be set directly"
            )));
        }
        if path == "session.debug" {
            self.debug = value.parse::<DebugLevel>().map_err(TaskpilotError::ConfigError)?;
        }

        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| TaskpilotError::ConfigError("empty settings key".to_string()))?;

        let mut table = &mut self.values;
        for segment in parents {
            let entry = table
                .entry(segment.to_string())
                .or_insert(toml::Value::Table(toml::Table::new()));
            table = match entry {
                toml::Value::Table(t) => t,
                other => {
                    return Err(TaskpilotError::ConfigError(format!(
                        "cannot set '{path}': '{segment}' holds a {}",
                        other.type_str()
                    )));
                }
            };
        }

        debug!(key = path, "settings value updated");
        table.insert(leaf.to_string(), toml::Value::String(value.to_string()));
        Ok(())
    }

    fn known_schema_keys(&self) -> BTreeSet<String> {
        SCHEMA_KEYS.iter().map(|(key, _)| key.to_string()).collect()
    }

    fn label(&self, path: &str) -> Option<String> {
        self.labels
            .get(path)
            .cloned()
            .or_else(|| Settings::schema_label(path).map(str::to_string))
    }

    fn cache_label(&mut self, path: &str, label: &str) {
        debug!(key = path, label, "caching settings label");
        self.labels.insert(path.to_string(), label.to_string());
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut document = self.values.clone();
        if !self.labels.is_empty() {
            let labels: toml::Table = self
                .labels
                .iter()
                .map(|(k, v)| (k.clone(), toml::Value::String(v.clone())))
                .collect();
            document.insert(LABELS_TABLE.to_string(), toml::Value::Table(labels));
        }

        let contents = toml::to_string(&document)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        info!(path = %path.display(), "settings saved");
        Ok(())
    }
}
