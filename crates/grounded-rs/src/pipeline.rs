//! The summarization pipeline.
//!
//! [`GroundedSummarizer`] wires the stages together for one request:
//!
//! ```text
//! Observation + GoalPlan
//!   → select_content          (digest, kind, counters, access flags)
//!   → summarize_chunks        (only for oversized page-text/item digests)
//!   → GenerationProfile + build_summary_prompt
//!   → StreamingModelRunner    (one primary call, streamed)
//!   → sanitize_output → validate_output
//!   → model answer, or synthesize_fallback on rejection
//! ```
//!
//! A request makes at most one primary call plus the chunk calls; a rejected
//! answer is never retried. An empty digest short-circuits to
//! [`NOT_STATED`] before any runner is needed.

use crate::NOT_STATED;
use crate::chunk::{ChunkOutcome, should_chunk, split_into_chunks, summarize_chunks};
use crate::config::SummarizerConfig;
use crate::error::{Result, SummarizeError};
use crate::events::{EventHandler, NoopHandler, SummaryEvent};
use crate::fallback::{limited_visibility_note, synthesize_fallback};
use crate::model::{GenerationRequest, StreamingModelRunner};
use crate::observation::{GoalPlan, Observation};
use crate::profile::GenerationProfile;
use crate::prompt::build_summary_prompt;
use crate::select::{SummaryInput, SummaryKind, select_content};
use crate::stream::{ReplacementBuffer, SummaryDelta};
use crate::validate::{ValidationOutcome, sanitize_output, validate_output};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Where the final answer text came from.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AnswerSource {
    /// Validated model output.
    Model,
    /// Synthesized from the digest after the model output was rejected.
    Fallback,
    /// Nothing survived selection; the canonical answer, no model call.
    EmptyDigest,
}

/// The final answer for one request.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    pub text: String,
    pub source: AnswerSource,
    pub kind: SummaryKind,
    /// `None` when no model output was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ValidationOutcome>,
    pub access_limited: bool,
    pub access_signals: Vec<String>,
}

impl SummaryResult {
    fn empty(input: SummaryInput) -> Self {
        Self {
            text: NOT_STATED.to_string(),
            source: AnswerSource::EmptyDigest,
            kind: input.kind(),
            outcome: None,
            access_limited: input.access_limited,
            access_signals: input.access_signals,
        }
    }

    /// Whether the text is validated model output.
    pub fn is_model_answer(&self) -> bool {
        self.source == AnswerSource::Model
    }
}

/// Everything decided before the primary call.
enum Prepared<'a> {
    Answered(SummaryResult),
    Cancelled,
    Generate {
        input: SummaryInput,
        request: GenerationRequest,
        runner: &'a dyn StreamingModelRunner,
    },
}

/// Grounded summarization over a borrowed model runner.
///
/// ```
/// use grounded_rs::config::SummarizerConfig;
/// use grounded_rs::model::scripted::ScriptedRunner;
/// use grounded_rs::observation::{GoalPlan, Observation, ObservedBlock};
/// use grounded_rs::pipeline::GroundedSummarizer;
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut page = Observation::new("https://example.com", "Menu");
/// page.blocks.push(ObservedBlock::new("nav", "Home News Sports").with_role("navigation"));
///
/// let runner = ScriptedRunner::new();
/// let result = GroundedSummarizer::new(SummarizerConfig::default())
///     .with_runner(&runner)
///     .summarize(&page, &GoalPlan::default())
///     .await
///     .unwrap();
/// assert_eq!(result.text, "Not stated in the page.");
/// assert_eq!(runner.call_count(), 0);
/// # }
/// ```
pub struct GroundedSummarizer<'a> {
    runner: Option<&'a dyn StreamingModelRunner>,
    config: SummarizerConfig,
    event_handler: &'a dyn EventHandler,
}

impl<'a> GroundedSummarizer<'a> {
    pub fn new(config: SummarizerConfig) -> Self {
        Self {
            runner: None,
            config,
            event_handler: &NoopHandler,
        }
    }

    /// Bind the generative backend. Without one, any request with content
    /// fails with [`SummarizeError::CollaboratorUnavailable`].
    pub fn with_runner(mut self, runner: &'a dyn StreamingModelRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Summarize one page to completion.
    pub async fn summarize(&self, observation: &Observation, plan: &GoalPlan) -> Result<SummaryResult> {
        self.summarize_cancellable(observation, plan, &CancellationToken::new())
            .await
    }

    /// Like [`summarize`](Self::summarize), returning
    /// [`SummarizeError::Cancelled`] if `cancel` fires first.
    pub async fn summarize_cancellable(
        &self,
        observation: &Observation,
        plan: &GoalPlan,
        cancel: &CancellationToken,
    ) -> Result<SummaryResult> {
        let (input, request, runner) = match self.prepare(observation, plan, cancel).await? {
            Prepared::Answered(result) => return Ok(result),
            Prepared::Cancelled => return Err(SummarizeError::Cancelled),
            Prepared::Generate {
                input,
                request,
                runner,
            } => (input, request, runner),
        };

        let mut model = runner.stream_text(request);
        let mut raw = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.event_handler.on_event(&SummaryEvent::Cancelled);
                    return Err(SummarizeError::Cancelled);
                }
                next = model.next() => next,
            };
            let Some(delta) = next else { break };
            let delta = delta?;
            self.event_handler.on_event(&SummaryEvent::TextDelta(&delta));
            raw.push_str(&delta);
        }
        Ok(self.finish(&raw, input, plan))
    }

    /// Summarize one page as a stream of display deltas.
    ///
    /// Model deltas are forwarded as [`SummaryDelta::Text`] as they arrive,
    /// with replacement markers resolved. Once the model stream is drained
    /// the answer is validated; if the final answer differs from what was
    /// forwarded, one closing [`SummaryDelta::Replace`] carries it. Folding
    /// a fully drained stream with [`apply_deltas`](crate::stream::apply_deltas)
    /// gives the same text as [`summarize`](Self::summarize).
    ///
    /// Cancelling `cancel` ends the stream without another item: no
    /// validation, fallback, or pending replacement is applied. A model
    /// failure is yielded as the last item, after any partial deltas.
    pub fn summarize_stream<'s>(
        &'s self,
        observation: &'s Observation,
        plan: &'s GoalPlan,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<SummaryDelta>> + Send + 's {
        async_stream::stream! {
            let prepared = match self.prepare(observation, plan, &cancel).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let (input, request, runner) = match prepared {
                Prepared::Answered(result) => {
                    yield Ok(SummaryDelta::Text(result.text));
                    return;
                }
                Prepared::Cancelled => return,
                Prepared::Generate { input, request, runner } => (input, request, runner),
            };

            let mut model = runner.stream_text(request);
            let mut buffer = ReplacementBuffer::new();
            let mut raw = String::new();
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    next = model.next() => Some(next),
                };
                let delta = match next {
                    None => {
                        debug!("Stream cancelled after {} chars", raw.len());
                        self.event_handler.on_event(&SummaryEvent::Cancelled);
                        return;
                    }
                    Some(None) => break,
                    Some(Some(Err(e))) => {
                        yield Err(SummarizeError::from(e));
                        return;
                    }
                    Some(Some(Ok(delta))) => delta,
                };
                raw.push_str(&delta);
                for out in buffer.push(&delta) {
                    if let SummaryDelta::Text(text) = &out {
                        self.event_handler.on_event(&SummaryEvent::TextDelta(text));
                    }
                    yield Ok(out);
                }
            }
            if let Some(out) = buffer.flush() {
                yield Ok(out);
            }

            let result = self.finish(&raw, input, plan);
            if result.text != buffer.text() {
                yield Ok(SummaryDelta::Replace(result.text));
            }
        }
    }

    /// Select, short-circuit, condense, and build the primary request.
    async fn prepare(
        &self,
        observation: &Observation,
        plan: &GoalPlan,
        cancel: &CancellationToken,
    ) -> Result<Prepared<'a>> {
        if cancel.is_cancelled() {
            self.event_handler.on_event(&SummaryEvent::Cancelled);
            return Ok(Prepared::Cancelled);
        }

        let mut input = select_content(observation, plan);
        self.event_handler.on_event(&SummaryEvent::ContentSelected {
            kind: input.kind(),
            digest_chars: input.digest_chars(),
            used_items: input.used_items,
            used_blocks: input.used_blocks,
            used_comments: input.used_comments,
            access_limited: input.access_limited,
        });

        if input.text.trim().is_empty() {
            self.event_handler.on_event(&SummaryEvent::EmptyDigest);
            return Ok(Prepared::Answered(SummaryResult::empty(input)));
        }

        let runner = self.runner.ok_or(SummarizeError::CollaboratorUnavailable)?;

        if let Some(chunking) = self.config.chunking.active()
            && should_chunk(&input, chunking)
        {
            let chunks = split_into_chunks(&input.text, chunking.chunk_chars, chunking.max_chunks);
            self.event_handler.on_event(&SummaryEvent::ChunkingStarted {
                chunks: chunks.len(),
                digest_chars: input.digest_chars(),
            });
            match summarize_chunks(runner, &input, &chunks, chunking, cancel).await? {
                ChunkOutcome::Condensed { text, kept } => {
                    input = input.with_condensed_text(text);
                    self.event_handler.on_event(&SummaryEvent::ChunkingFinished {
                        kept,
                        condensed_chars: input.digest_chars(),
                    });
                }
                ChunkOutcome::Unchanged => {
                    debug!("No chunk summary survived; keeping the original digest");
                }
                ChunkOutcome::Cancelled => {
                    self.event_handler.on_event(&SummaryEvent::Cancelled);
                    return Ok(Prepared::Cancelled);
                }
            }
        }

        let profile = GenerationProfile::for_input(&input, plan, self.config.max_tokens);
        let prompt = build_summary_prompt(&input, plan, &profile);
        debug!(
            "Prompt sizes: system={} chars, user={} chars",
            prompt.system.len(),
            prompt.user.len()
        );
        self.event_handler.on_event(&SummaryEvent::GenerationStarted {
            max_tokens: profile.max_tokens,
            temperature: profile.temperature,
            top_p: profile.top_p,
        });
        let request = GenerationRequest {
            system_prompt: prompt.system,
            user_prompt: prompt.user,
            max_tokens: profile.max_tokens,
            temperature: profile.temperature,
            top_p: profile.top_p,
            repetition_penalty: self.config.repetition_penalty,
            repetition_context_size: self.config.repetition_context_size,
            enable_thinking: self.config.enable_thinking,
        };
        Ok(Prepared::Generate {
            input,
            request,
            runner,
        })
    }

    /// Sanitize and judge the drained model output.
    fn finish(&self, raw: &str, input: SummaryInput, plan: &GoalPlan) -> SummaryResult {
        let sanitized = sanitize_output(raw);
        let outcome = validate_output(&sanitized, &input, plan);
        self.event_handler.on_event(&SummaryEvent::Validated(outcome));

        let (text, source) = match outcome {
            ValidationOutcome::Grounded if input.access_limited => {
                (limited_visibility_note(&sanitized), AnswerSource::Model)
            }
            ValidationOutcome::Grounded => (sanitized, AnswerSource::Model),
            ValidationOutcome::Ungrounded(reason) => {
                self.event_handler.on_event(&SummaryEvent::FallbackUsed { reason });
                (synthesize_fallback(&input, plan), AnswerSource::Fallback)
            }
        };
        info!(
            "Answer ready: {} chars from {:?} ({})",
            text.chars().count(),
            source,
            input.kind()
        );
        SummaryResult {
            text,
            source,
            kind: input.kind(),
            outcome: Some(outcome),
            access_limited: input.access_limited,
            access_signals: input.access_signals,
        }
    }
}
