//! The generative collaborator seam.
//!
//! Everything that produces text implements [`StreamingModelRunner`]: the
//! OpenRouter-backed [`OpenRouterRunner`](openrouter::OpenRouterRunner) in
//! production, and [`ScriptedRunner`](scripted::ScriptedRunner) for replaying
//! canned responses in tests and offline audits.

pub mod openrouter;
pub mod scripted;

use futures::{Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;

/// One model call.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: Option<f32>,
    /// Tokens of history the repetition penalty looks back over.
    pub repetition_context_size: u32,
    pub enable_thinking: bool,
}

/// Failures raised by a runner.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// The backend could not be reached or refused the request.
    #[error("model unavailable: {0}")]
    Unavailable(String),
    /// The backend answered with something that is not a usable text stream.
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}

/// A lazy sequence of text deltas. The first `Err` ends the stream.
pub type TextStream<'a> = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send + 'a>>;

/// A generative backend that streams text.
///
/// Implementations must be usable from several concurrent calls: chunk
/// summarization opens up to four streams at once through a shared reference.
pub trait StreamingModelRunner: Send + Sync {
    /// Start a generation. Connection errors surface as the first stream item.
    fn stream_text(&self, request: GenerationRequest) -> TextStream<'_>;
}

/// Drain a stream into one string, stopping at the first error.
pub async fn collect_text(mut stream: TextStream<'_>) -> Result<String, ModelError> {
    let mut text = String::new();
    while let Some(delta) = stream.next().await {
        text.push_str(&delta?);
    }
    Ok(text)
}
