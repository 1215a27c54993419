// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{LABELS_TABLE, RawSettingsFile, Settings};
use crate::errors::{Result, TaskpilotError};
use crate::types::DebugLevel;

impl TryFrom<RawSettingsFile> for Settings {
    type Error = crate::errors::TaskpilotError;

    fn try_from(raw: RawSettingsFile) -> std::result::Result<Self, Self::Error> {
        let mut values = raw.table;
        let labels = take_labels(&mut values)?;
        let debug = validate_session(&values)?;
        validate_service(&values)?;
        Ok(Settings::new_unchecked(values, labels, debug))
    }
}

/// Split the reserved `[labels]` table off the value tree.
fn take_labels(values: &mut toml::Table) -> Result<BTreeMap<String, String>> {
    let Some(raw) = values.remove(LABELS_TABLE) else {
        return Ok(BTreeMap::new());
    };

    let toml::Value::Table(table) = raw else {
        return Err(TaskpilotError::ConfigError(format!(
            "`{LABELS_TABLE}` must be a table of strings"
        )));
    };

    let mut labels = BTreeMap::new();
    for (key, value) in table {
        match value {
            toml::Value::String(label) => {
                labels.insert(key, label);
            }
            other => {
                return Err(TaskpilotError::ConfigError(format!(
                    "label for '{key}' must be a string (got {})",
                    other.type_str()
                )));
            }
        }
    }
    Ok(labels)
}

fn validate_session(values: &toml::Table) -> Result<DebugLevel> {
    let Some(session) = values.get("session") else {
        return Ok(DebugLevel::default());
    };

    let toml::Value::Table(session) = session else {
        return Err(TaskpilotError::ConfigError(
            "[session] must be a table".to_string(),
        ));
    };

    match session.get("debug") {
        None => Ok(DebugLevel::default()),
        Some(toml::Value::String(s)) => s.parse().map_err(TaskpilotError::ConfigError),
        Some(other) => Err(TaskpilotError::ConfigError(format!(
            "session.debug must be a string (got {})",
            other.type_str()
        ))),
    }
}

fn validate_service(values: &toml::Table) -> Result<()> {
    let Some(service) = values.get("service") else {
        return Ok(());
    };

    let toml::Value::Table(service) = service else {
        return Err(TaskpilotError::ConfigError(
            "[service] must be a table".to_string(),
        ));
    };

    for key in ["model", "key"] {
        if let Some(value) = service.get(key) {
            if !value.is_str() {
                return Err(TaskpilotError::ConfigError(format!(
                    "service.{key} must be a string (got {})",
                    value.type_str()
                )));
            }
        }
    }
    Ok(())
}
