//! OpenRouter-backed runner over Server-Sent Events.
//!
//! [`OpenRouterClient::chat_stream`] posts a streaming chat completion and
//! turns `data:` payloads into text deltas as they arrive off the wire.
//! Reasoning deltas are not forwarded; only answer text reaches the caller.

use super::{GenerationRequest, ModelError, StreamingModelRunner, TextStream};
use crate::{
    ChatRequest, Message, OPENROUTER_URL, OpenRouterClient, ReasoningConfig, ReasoningEffort,
};
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Environment variable holding the OpenRouter API key.
pub const API_KEY_ENV: &str = "OPENROUTER_KEY";

#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

impl OpenRouterClient {
    async fn open_stream(&self, body: &ChatRequest) -> Result<reqwest::Response, ModelError> {
        let resp = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Unavailable(format!("streaming request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ModelError::Unavailable(format!(
                "OpenRouter API HTTP {status}: {text}"
            )));
        }
        Ok(resp)
    }

    /// Send a chat completion request with SSE streaming.
    ///
    /// The returned stream yields content deltas in order and ends after
    /// `data: [DONE]`, at end of body, or after the first error.
    pub fn chat_stream(&self, mut body: ChatRequest) -> TextStream<'_> {
        body.stream = true;
        Box::pin(async_stream::stream! {
            debug!(
                "Streaming request: model={}, max_tokens={}, temp={}",
                body.model.as_deref().unwrap_or("(none)"),
                body.max_tokens,
                body.temperature,
            );
            let start = Instant::now();
            match self.open_stream(&body).await {
                Err(e) => {
                    yield Err(e);
                }
                Ok(mut resp) => {
                    // Bytes, not text: a multi-byte character may straddle two chunks.
                    let mut buffer: Vec<u8> = Vec::new();
                    let mut deltas = 0usize;
                    let mut done = false;
                    while !done {
                        let chunk = match resp.chunk().await {
                            Ok(Some(chunk)) => chunk,
                            Ok(None) => break,
                            Err(e) => {
                                yield Err(ModelError::InvalidResponse(format!(
                                    "failed to read streaming chunk: {e}"
                                )));
                                break;
                            }
                        };
                        buffer.extend_from_slice(&chunk);

                        while let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                            let raw: Vec<u8> = buffer.drain(..=newline_pos).collect();
                            let line = String::from_utf8_lossy(&raw);
                            match parse_sse_line(line.trim()) {
                                SseLine::Skip => {}
                                SseLine::Done => {
                                    done = true;
                                    break;
                                }
                                SseLine::Deltas(items) => {
                                    for item in items {
                                        deltas += 1;
                                        yield Ok(item);
                                    }
                                }
                                SseLine::Failed(e) => {
                                    yield Err(e);
                                    done = true;
                                    break;
                                }
                            }
                        }
                    }

                    // An unterminated final line still carries data.
                    if !done {
                        let line = String::from_utf8_lossy(&buffer);
                        match parse_sse_line(line.trim()) {
                            SseLine::Deltas(items) => {
                                for item in items {
                                    deltas += 1;
                                    yield Ok(item);
                                }
                            }
                            SseLine::Failed(e) => {
                                yield Err(e);
                            }
                            SseLine::Skip | SseLine::Done => {}
                        }
                    }
                    debug!(
                        "Stream completed with {} deltas in {:.1}s",
                        deltas,
                        start.elapsed().as_secs_f64()
                    );
                }
            }
        })
    }
}

#[derive(Debug, PartialEq)]
enum SseLine {
    Skip,
    Done,
    Deltas(Vec<String>),
    Failed(ModelError),
}

fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Skip;
    }
    if line == "data: [DONE]" {
        return SseLine::Done;
    }
    match line.strip_prefix("data: ") {
        Some(data) => parse_sse_data(data),
        None => SseLine::Skip,
    }
}

/// Parse a single SSE `data:` payload.
fn parse_sse_data(data: &str) -> SseLine {
    let chunk = match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Failed to parse SSE chunk: {e}: {data}");
            return SseLine::Skip;
        }
    };
    if let Some(err) = chunk.error {
        return SseLine::Failed(ModelError::InvalidResponse(format!(
            "OpenRouter API error: {}",
            err.message
        )));
    }
    let mut deltas = Vec::new();
    for choice in chunk.choices.unwrap_or_default() {
        if let Some(content) = choice.delta.and_then(|d| d.content)
            && !content.is_empty()
        {
            deltas.push(content);
        }
        if choice.finish_reason.is_some() {
            trace!("Stream finish_reason: {:?}", choice.finish_reason);
        }
    }
    SseLine::Deltas(deltas)
}

/// [`StreamingModelRunner`] over the OpenRouter chat completions API.
pub struct OpenRouterRunner {
    client: OpenRouterClient,
    model: String,
}

impl OpenRouterRunner {
    pub fn new(client: OpenRouterClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Build a runner with the API key from [`API_KEY_ENV`].
    pub fn from_env(model: impl Into<String>) -> Result<Self, ModelError> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| ModelError::Unavailable(format!("{API_KEY_ENV} not set")))?;
        let client = OpenRouterClient::new(api_key).map_err(ModelError::Unavailable)?;
        Ok(Self::new(client, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Map a generation request onto the wire format.
    ///
    /// OpenRouter has no repetition-window parameter, so
    /// `repetition_context_size` is not sent.
    pub fn build_body(&self, request: &GenerationRequest) -> ChatRequest {
        let reasoning = (!request.enable_thinking).then(|| ReasoningConfig {
            effort: Some(ReasoningEffort::None),
            exclude: Some(true),
        });
        ChatRequest {
            model: Some(self.model.clone()),
            messages: vec![
                Message::system(request.system_prompt.clone()),
                Message::user(request.user_prompt.clone()),
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: Some(request.top_p),
            repetition_penalty: request.repetition_penalty,
            reasoning,
            stream: false,
        }
    }
}

impl StreamingModelRunner for OpenRouterRunner {
    fn stream_text(&self, request: GenerationRequest) -> TextStream<'_> {
        trace!(
            "Generation request: {} system chars, {} user chars, repetition context {}",
            request.system_prompt.len(),
            request.user_prompt.len(),
            request.repetition_context_size
        );
        self.client.chat_stream(self.build_body(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_deltas() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Deltas(vec!["Hello".into()]));
    }

    #[test]
    fn skips_comments_blank_and_reasoning_only() {
        assert_eq!(parse_sse_line(": OPENROUTER PROCESSING"), SseLine::Skip);
        assert_eq!(parse_sse_line(""), SseLine::Skip);
        let reasoning = r#"data: {"choices":[{"delta":{"reasoning":"hmm"}}]}"#;
        assert_eq!(parse_sse_line(reasoning), SseLine::Deltas(vec![]));
        assert_eq!(parse_sse_line("data: not json"), SseLine::Skip);
    }

    #[test]
    fn recognizes_done_and_errors() {
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
        let err = r#"data: {"error":{"message":"rate limited"}}"#;
        assert_eq!(
            parse_sse_line(err),
            SseLine::Failed(ModelError::InvalidResponse(
                "OpenRouter API error: rate limited".into()
            ))
        );
    }

    #[test]
    fn body_disables_reasoning_by_default() {
        let client = OpenRouterClient::new("test-key").unwrap();
        let runner = OpenRouterRunner::new(client, "qwen/qwen3-8b");
        let request = GenerationRequest {
            system_prompt: "sys".into(),
            user_prompt: "user".into(),
            max_tokens: 220,
            temperature: 0.35,
            top_p: 0.75,
            repetition_penalty: Some(1.1),
            repetition_context_size: 20,
            enable_thinking: false,
        };
        let body = serde_json::to_value(runner.build_body(&request)).unwrap();
        assert_eq!(body["model"], "qwen/qwen3-8b");
        assert_eq!(body["max_tokens"], 220);
        assert_eq!(body["reasoning"]["effort"], "none");
        assert_eq!(body["reasoning"]["exclude"], true);
        assert_eq!(body["reasoning"].as_object().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body.get("stream").is_none());

        let thinking = GenerationRequest {
            enable_thinking: true,
            ..request
        };
        let body = serde_json::to_value(runner.build_body(&thinking)).unwrap();
        assert!(body.get("reasoning").is_none());
    }
}
