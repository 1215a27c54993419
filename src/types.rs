// src/types.rs

use std::str::FromStr;

use serde::Deserialize;

/// How much internal detail the session records on its timeline.
///
/// - `None`: nothing beyond the regular components (default).
/// - `Info`: a one-line summary of what was scheduled.
/// - `Verbose`: the full task tree handed to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    #[default]
    None,
    Info,
    Verbose,
}

impl FromStr for DebugLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(DebugLevel::None),
            "info" => Ok(DebugLevel::Info),
            "verbose" => Ok(DebugLevel::Verbose),
            other => Err(format!(
                "invalid debug level: {other} (expected \"none\", \"info\" or \"verbose\")"
            )),
        }
    }
}

/// Per-session values fixed when the session starts.
///
/// Passed by value into the router and the session core; there is no
/// global equivalent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionContext {
    debug: DebugLevel,
}

impl SessionContext {
    pub fn new(debug: DebugLevel) -> Self {
        Self { debug }
    }

    pub fn debug(&self) -> DebugLevel {
        self.debug
    }
}
