//! Replay runner for tests and offline audits.
//!
//! [`ScriptedRunner`] answers each `stream_text` call with the next queued
//! response, split into word-sized deltas, and records every request it was
//! given so callers can assert on call counts and prompt contents.

use super::{GenerationRequest, ModelError, StreamingModelRunner, TextStream};
use futures::stream;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum ScriptedResponse {
    Text(String),
    Fail { partial: String, error: ModelError },
}

/// A [`StreamingModelRunner`] that replays queued responses in call order.
///
/// ```
/// use grounded_rs::model::scripted::ScriptedRunner;
/// use grounded_rs::model::{GenerationRequest, StreamingModelRunner, collect_text};
///
/// # #[tokio::main]
/// # async fn main() {
/// let request = GenerationRequest {
///     system_prompt: "Summarize.".into(),
///     user_prompt: "page text".into(),
///     max_tokens: 160,
///     temperature: 0.5,
///     top_p: 0.75,
///     repetition_penalty: None,
///     repetition_context_size: 20,
///     enable_thinking: false,
/// };
/// let runner = ScriptedRunner::new().with_response("Hello world");
/// let text = collect_text(runner.stream_text(request)).await.unwrap();
/// assert_eq!(text, "Hello world");
/// assert_eq!(runner.call_count(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push(ScriptedResponse::Text(text.into()));
        self
    }

    /// Queue a call that fails before producing any text.
    pub fn with_failure(self, error: ModelError) -> Self {
        self.with_partial_failure("", error)
    }

    /// Queue a call that streams `partial` and then fails.
    pub fn with_partial_failure(self, partial: impl Into<String>, error: ModelError) -> Self {
        self.push(ScriptedResponse::Fail {
            partial: partial.into(),
            error,
        });
        self
    }

    fn push(&self, response: ScriptedResponse) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    /// Number of `stream_text` calls so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Every request received, in call order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Responses still queued.
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Word-sized deltas that concatenate back to `text`.
fn split_deltas(text: &str) -> Vec<Result<String, ModelError>> {
    text.split_inclusive(' ')
        .map(|word| Ok(word.to_string()))
        .collect()
}

impl StreamingModelRunner for ScriptedRunner {
    fn stream_text(&self, request: GenerationRequest) -> TextStream<'_> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        let next = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        let items = match next {
            Some(ScriptedResponse::Text(text)) => split_deltas(&text),
            Some(ScriptedResponse::Fail { partial, error }) => {
                let mut items = split_deltas(&partial);
                items.push(Err(error));
                items
            }
            None => vec![Err(ModelError::InvalidResponse(
                "scripted runner has no response queued".into(),
            ))],
        };
        Box::pin(stream::iter(items))
    }
}
