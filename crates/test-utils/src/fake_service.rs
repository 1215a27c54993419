use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use taskpilot::errors::{Result, TaskpilotError};
use taskpilot::service::{LanguageService, ToolResponse};

type Scripted = std::result::Result<ToolResponse, String>;

/// A fake language service that replays scripted responses per tool, in
/// order, and records every `(tool, prompt)` it was called with.
///
/// A call with nothing scripted for its tool fails.
#[derive(Debug, Default)]
pub struct FakeLanguageService {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeLanguageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, tool: &str, response: ToolResponse) -> Self {
        self.script(tool, Ok(response))
    }

    pub fn fail(self, tool: &str, error: &str) -> Self {
        self.script(tool, Err(error.to_string()))
    }

    /// Shared handle on the recorded calls.
    pub fn calls(&self) -> Arc<Mutex<Vec<(String, String)>>> {
        Arc::clone(&self.calls)
    }

    fn script(self, tool: &str, entry: Scripted) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(tool.to_string())
            .or_default()
            .push_back(entry);
        self
    }
}

impl LanguageService for FakeLanguageService {
    fn process_with_tool<'a>(
        &'a self,
        prompt: &'a str,
        tool: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResponse>> + Send + 'a>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push((tool.to_string(), prompt.to_string()));

            let next = self
                .responses
                .lock()
                .unwrap()
                .get_mut(tool)
                .and_then(VecDeque::pop_front);

            match next {
                Some(Ok(response)) => Ok(response),
                Some(Err(error)) => Err(TaskpilotError::ServiceError(error)),
                None => Err(TaskpilotError::ServiceError(format!(
                    "no scripted response for tool '{tool}'"
                ))),
            }
        })
    }
}
