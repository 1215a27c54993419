// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawSettingsFile, Settings};
use crate::errors::Result;

/// Environment variable overriding the default settings location.
pub const SETTINGS_ENV: &str = "TASKPILOT_SETTINGS";

/// Load a settings file from a given path and return the raw document.
///
/// This only performs TOML deserialization; it does **not** validate
/// reserved keys. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSettingsFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let table: toml::Table = toml::from_str(&contents)?;

    Ok(RawSettingsFile { table })
}

/// Load a settings file from path and validate it.
///
/// The returned settings remember `path`, so `persist()` writes back to the
/// same file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Settings> {
    let raw = load_from_path(&path)?;
    let settings = Settings::try_from(raw)?;
    Ok(settings.with_path(path.as_ref()))
}

/// Like [`load_and_validate`], but a missing file yields empty settings
/// bound to `path` (created on first `persist()`).
pub fn load_or_default(path: impl AsRef<Path>) -> Result<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "settings file not found; starting empty");
        return Ok(Settings::in_memory().with_path(path));
    }
    load_and_validate(path)
}

/// Resolve the settings path: `TASKPILOT_SETTINGS` if set, otherwise
/// `taskpilot.toml` in the current working directory.
pub fn default_settings_path() -> PathBuf {
    std::env::var_os(SETTINGS_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("taskpilot.toml"))
}
