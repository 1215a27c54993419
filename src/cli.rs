// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskpilot`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskpilot",
    version,
    about = "Turn a natural-language request into confirmed, executed tasks.",
    long_about = None
)]
pub struct CliArgs {
    /// The request, e.g. `taskpilot install dependencies and run the tests`.
    #[arg(value_name = "COMMAND", required = true, num_args = 1..)]
    pub command: Vec<String>,

    /// JSON classification to use instead of a live language model.
    ///
    /// Without it, the request itself is run as a single shell command.
    #[arg(long, value_name = "PATH")]
    pub plan: Option<String>,

    /// Path to the settings file (TOML).
    ///
    /// If omitted, `TASKPILOT_SETTINGS` or `taskpilot.toml` in the current
    /// working directory is used.
    #[arg(long, value_name = "PATH")]
    pub settings: Option<String>,

    /// Accept every confirmation and take the first option of every choice.
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKPILOT_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Classify and route the request, print the pipeline, but don't run
    /// anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// The request words joined back into one line.
    pub fn request(&self) -> String {
        self.command.join(" ")
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
