// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::types::DebugLevel;

/// Keys defined by taskpilot itself. Labels for these are never cached.
pub const SCHEMA_KEYS: &[(&str, &str)] = &[
    ("session.debug", "Debug level"),
    ("service.model", "Language model"),
    ("service.key", "Language service API key"),
];

/// Name of the reserved table holding cached labels.
pub const LABELS_TABLE: &str = "labels";

/// Settings document exactly as read from a TOML file.
///
/// Any TOML tree is accepted; values are addressed by dotted path:
///
/// ```toml
/// [session]
/// debug = "info"
///
/// [project]
/// path = "~/code/app"
///
/// [labels]
/// "project.path" = "Project directory"
/// ```
#[derive(Debug, Clone, Default)]
pub struct RawSettingsFile {
    pub table: toml::Table,
}

/// Validated settings.
///
/// Construct via `Settings::try_from(RawSettingsFile)` (see `validate.rs`)
/// or [`Settings::in_memory`].
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Where `persist()` writes to; `None` keeps settings in memory only.
    pub(crate) path: Option<PathBuf>,
    pub(crate) values: toml::Table,
    pub(crate) labels: BTreeMap<String, String>,
    pub(crate) debug: DebugLevel,
}

impl Settings {
    /// Empty settings that are never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub(crate) fn new_unchecked(
        values: toml::Table,
        labels: BTreeMap<String, String>,
        debug: DebugLevel,
    ) -> Self {
        Self {
            path: None,
            values,
            labels,
            debug,
        }
    }

    /// Attach the file `persist()` should write to.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    /// Debug level from `session.debug`.
    pub fn debug_level(&self) -> DebugLevel {
        self.debug
    }

    /// Human label of a schema key.
    pub fn schema_label(path: &str) -> Option<&'static str> {
        SCHEMA_KEYS
            .iter()
            .find(|(key, _)| *key == path)
            .map(|(_, label)| *label)
    }
}
