//! Grounded page summarization for LLM-backed browsing assistants.
//!
//! `grounded-rs` turns a structured snapshot of one web page (an
//! [`Observation`](observation::Observation)) and the user's goal (a
//! [`GoalPlan`](observation::GoalPlan)) into a short answer that is checked
//! against the page before anyone sees it. The core abstraction is the
//! [`GroundedSummarizer`](pipeline::GroundedSummarizer): it selects and
//! cleans the page content, sizes the prompt for the kind of content found,
//! condenses oversized pages chunk by chunk, streams one model call, and
//! validates the result. Rejected output is replaced by a deterministic
//! answer built from the page itself, so callers never receive unverified
//! model text.
//!
//! # Getting started
//!
//! ```ignore
//! use grounded_rs::config::SummarizerConfig;
//! use grounded_rs::events::LoggingHandler;
//! use grounded_rs::model::openrouter::OpenRouterRunner;
//! use grounded_rs::pipeline::GroundedSummarizer;
//! use grounded_rs::request::SummaryRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request = SummaryRequest::from_path("page.json".as_ref())?;
//!     let runner = OpenRouterRunner::from_env(grounded_rs::DEFAULT_MODEL)?;
//!
//!     let result = GroundedSummarizer::new(SummarizerConfig::default())
//!         .with_runner(&runner)
//!         .with_event_handler(&LoggingHandler)
//!         .summarize(&request.observation, &request.plan)
//!         .await?;
//!
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Feed a page in:** [`observation`] holds the input records;
//!   [`request::SummaryRequest`] loads them from schema-checked JSON.
//!
//! - **See what the model will see:** [`select::select_content`] builds the
//!   digest and decides its [`SummaryKind`](select::SummaryKind). The
//!   `grounded digest` CLI subcommand prints it.
//!
//! - **Tune generation:** [`config::SummarizerConfig`] for token budget,
//!   repetition penalty, thinking, and chunking;
//!   [`profile::GenerationProfile`] for the per-kind sampling table.
//!
//! - **Plug in a model:** implement
//!   [`StreamingModelRunner`](model::StreamingModelRunner). Use
//!   [`OpenRouterRunner`](model::openrouter::OpenRouterRunner) for the
//!   hosted API, or [`ScriptedRunner`](model::scripted::ScriptedRunner) to
//!   replay canned responses in tests.
//!
//! - **Judge an answer:** [`validate::validate_output`] and
//!   [`validate::sanitize_output`]; [`fallback::synthesize_fallback`] builds
//!   the replacement answer.
//!
//! - **Stream to a UI:** [`GroundedSummarizer::summarize_stream`](pipeline::GroundedSummarizer::summarize_stream)
//!   yields [`SummaryDelta`](stream::SummaryDelta)s; observe stages with an
//!   [`EventHandler`](events::EventHandler).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`observation`] | Page snapshot and goal plan records |
//! | [`text`] | Whitespace and sentence normalization, low-signal and chrome classifiers |
//! | [`select`] | Content selection into a digest, relevance filters, access-limited detection |
//! | [`profile`] | Output format, token budget, and sampling per content kind |
//! | [`prompt`] | System/user prompt assembly with untrusted-content fencing |
//! | [`model`] | Streaming runner trait, OpenRouter SSE runner, scripted runner |
//! | [`chunk`] | Map-reduce condensation of oversized digests |
//! | [`validate`] | Output sanitization and grounding checks |
//! | [`fallback`] | Deterministic answers from extracted content |
//! | [`stream`] | Display deltas and the replacement marker |
//! | [`pipeline`] | [`GroundedSummarizer`](pipeline::GroundedSummarizer) |
//!
//! # Design principles
//!
//! 1. **The page is the only source.** Every answer either passes the
//!    grounding checks or is rebuilt from the digest. Nothing else reaches
//!    the caller.
//!
//! 2. **Bounded model work.** One primary call, at most four chunk calls,
//!    no retries. A rejected answer goes straight to the fallback.
//!
//! 3. **Page text is untrusted.** It is fenced in the prompt, and answers
//!    that echo prompt instructions are rejected.
//!
//! 4. **Observability over magic.** Every stage reports through
//!    [`EventHandler`](events::EventHandler).

pub mod chunk;
pub mod config;
pub mod error;
pub mod events;
pub mod fallback;
pub mod model;
pub mod observation;
pub mod pipeline;
pub mod profile;
pub mod prompt;
pub mod request;
pub mod select;
pub mod stream;
pub mod text;
pub mod validate;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model for summarization calls.
pub const DEFAULT_MODEL: &str = "qwen/qwen3-8b";

/// The canonical answer when the page does not contain what was asked.
pub const NOT_STATED: &str = "Not stated in the page.";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`.
///
/// # Example
///
/// ```
/// use grounded_rs::json_schema_for;
/// use grounded_rs::request::SummaryRequest;
///
/// let schema = json_schema_for::<SummaryRequest>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"observation".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body, limited to the fields summarization uses.
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<Message>,

    // Generation parameters
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "is_zero_f32")]
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,

    // Reasoning / extended thinking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,

    /// Set by [`OpenRouterClient::chat_stream`]; omitted when false.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

/// Reasoning effort sent to OpenRouter.
///
/// Only `none` is ever sent: with thinking disabled the request turns
/// reasoning off, and with thinking enabled `reasoning` is omitted so the
/// model's default applies.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    None,
}

/// The `reasoning` object of a chat request.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReasoningConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effort: Option<ReasoningEffort>,
    /// Use reasoning internally but omit from response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<bool>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenRouter chat completions API.
///
/// Requests are sent by [`OpenRouterClient::chat_stream`], defined next to
/// the SSE parser in [`model::openrouter`].
pub struct OpenRouterClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) referer: String,
    pub(crate) title: String,
}

impl OpenRouterClient {
    /// Create a new client with the given API key and default headers.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_headers(api_key, "https://github.com/grounded-rs", "grounded-rs")
    }

    /// Create a new client with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("grounded-rs/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            referer: referer.into(),
            title: title.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content, "hello");
        assert_eq!(Message::user("world").role.to_string(), "user");
    }

    #[test]
    fn chat_request_default_skips_unset_fields() {
        let req = ChatRequest {
            model: Some("test-model".into()),
            messages: vec![Message::user("hi")],
            max_tokens: 100,
            temperature: 0.5,
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("top_p").is_none());
        assert!(json.get("reasoning").is_none());
        assert!(json.get("stream").is_none());

        let streaming = ChatRequest { stream: true, ..req };
        let json = serde_json::to_value(&streaming).unwrap();
        assert_eq!(json["stream"], true);
    }
}
