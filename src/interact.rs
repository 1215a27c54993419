// src/interact.rs

//! User decisions: option selection, confirmation and settings values.
//!
//! The runtime asks an [`Interaction`] whenever the focused component needs
//! the user. `None` / `false` means the user backed out, which the session
//! treats as a cancellation.

use std::future::Future;
use std::io::{BufRead, Write};
use std::pin::Pin;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::workflow::component::{OptionGroup, SettingField};

/// Future returned by every [`Interaction`] method.
pub type Prompt<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait Interaction: Send + Sync {
    /// Index of the chosen option, or `None` to cancel.
    fn select_option<'a>(&'a self, group: &'a OptionGroup) -> Prompt<'a, Option<usize>>;

    fn confirm<'a>(&'a self, message: &'a str) -> Prompt<'a, bool>;

    /// One `(key, value)` per field, or `None` to cancel.
    fn collect_values<'a>(
        &'a self,
        fields: &'a [SettingField],
    ) -> Prompt<'a, Option<Vec<(String, String)>>>;
}

/// Line-based prompts on stdin/stdout.
///
/// Stdin is read on a dedicated thread so a pending prompt never keeps the
/// process alive once the session is over.
#[derive(Debug)]
pub struct TerminalInteraction {
    lines: Mutex<mpsc::Receiver<String>>,
}

impl TerminalInteraction {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<String>(16);
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            debug!("stdin closed");
        });
        Self {
            lines: Mutex::new(rx),
        }
    }

    async fn ask(&self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        self.lines.lock().await.recv().await.map(|l| l.trim().to_string())
    }
}

impl Default for TerminalInteraction {
    fn default() -> Self {
        Self::new()
    }
}

impl Interaction for TerminalInteraction {
    fn select_option<'a>(&'a self, group: &'a OptionGroup) -> Prompt<'a, Option<usize>> {
        Box::pin(async move {
            println!("{}", group.prompt);
            for (i, option) in group.options.iter().enumerate() {
                println!("  {}) {option}", i + 1);
            }
            loop {
                let answer = self.ask("Choose an option (empty to cancel): ").await?;
                if answer.is_empty() {
                    return None;
                }
                match answer.parse::<usize>() {
                    Ok(n) if (1..=group.options.len()).contains(&n) => return Some(n - 1),
                    _ => println!("Please enter a number between 1 and {}.", group.options.len()),
                }
            }
        })
    }

    fn confirm<'a>(&'a self, message: &'a str) -> Prompt<'a, bool> {
        Box::pin(async move {
            let answer = self.ask(&format!("{message} [y/N] ")).await;
            matches!(
                answer.as_deref().map(str::to_lowercase).as_deref(),
                Some("y" | "yes")
            )
        })
    }

    fn collect_values<'a>(
        &'a self,
        fields: &'a [SettingField],
    ) -> Prompt<'a, Option<Vec<(String, String)>>> {
        Box::pin(async move {
            let mut values = Vec::with_capacity(fields.len());
            for field in fields {
                let value = self.ask(&format!("{} ({}): ", field.label, field.key)).await?;
                if value.is_empty() {
                    return None;
                }
                values.push((field.key.clone(), value));
            }
            Some(values)
        })
    }
}

/// Non-interactive decisions for `--yes`: accept every confirmation and
/// take the first option of every choice. Settings cannot be guessed, so a
/// request for values cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl Interaction for AutoApprove {
    fn select_option<'a>(&'a self, group: &'a OptionGroup) -> Prompt<'a, Option<usize>> {
        Box::pin(async move {
            debug!(prompt = %group.prompt, "auto-selecting first option");
            (!group.options.is_empty()).then_some(0)
        })
    }

    fn confirm<'a>(&'a self, message: &'a str) -> Prompt<'a, bool> {
        Box::pin(async move {
            debug!(%message, "auto-confirming");
            true
        })
    }

    fn collect_values<'a>(
        &'a self,
        fields: &'a [SettingField],
    ) -> Prompt<'a, Option<Vec<(String, String)>>> {
        Box::pin(async move {
            let keys: Vec<&str> = fields.iter().map(|f| f.key.as_str()).collect();
            warn!(?keys, "settings required but running non-interactively; cancelling");
            None
        })
    }
}
