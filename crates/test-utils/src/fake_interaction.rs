use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use taskpilot::interact::{Interaction, Prompt};
use taskpilot::workflow::component::{OptionGroup, SettingField};

/// An `Interaction` that replays scripted answers and records every prompt
/// it was shown.
///
/// Once a script runs dry it declines: no selection, no confirmation, no
/// values.
#[derive(Debug, Default)]
pub struct ScriptedInteraction {
    selections: Mutex<VecDeque<Option<usize>>>,
    confirmations: Mutex<VecDeque<bool>>,
    values: Mutex<VecDeque<Option<Vec<(String, String)>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(self, option: usize) -> Self {
        self.selections.lock().unwrap().push_back(Some(option));
        self
    }

    pub fn confirm(self, answer: bool) -> Self {
        self.confirmations.lock().unwrap().push_back(answer);
        self
    }

    pub fn provide(self, values: &[(&str, &str)]) -> Self {
        let values = values
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.values.lock().unwrap().push_back(Some(values));
        self
    }

    /// Shared handle on the prompts shown so far.
    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }

    fn record(&self, prompt: String) {
        self.prompts.lock().unwrap().push(prompt);
    }
}

impl Interaction for ScriptedInteraction {
    fn select_option<'a>(&'a self, group: &'a OptionGroup) -> Prompt<'a, Option<usize>> {
        Box::pin(async move {
            self.record(group.prompt.clone());
            self.selections.lock().unwrap().pop_front().flatten()
        })
    }

    fn confirm<'a>(&'a self, message: &'a str) -> Prompt<'a, bool> {
        Box::pin(async move {
            self.record(message.to_string());
            self.confirmations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(false)
        })
    }

    fn collect_values<'a>(
        &'a self,
        fields: &'a [SettingField],
    ) -> Prompt<'a, Option<Vec<(String, String)>>> {
        Box::pin(async move {
            let keys: Vec<&str> = fields.iter().map(|f| f.key.as_str()).collect();
            self.record(keys.join(", "));
            self.values.lock().unwrap().pop_front().flatten()
        })
    }
}
