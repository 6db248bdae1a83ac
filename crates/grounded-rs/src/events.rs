//! Events and handlers for observing a summarization run.
//!
//! The summarizer reports each pipeline stage through [`SummaryEvent`].
//! Callers implement [`EventHandler`] to log, render progress, or collect
//! metrics.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |

use crate::select::SummaryKind;
use crate::validate::{UngroundedReason, ValidationOutcome};
use tracing::{debug, info, trace, warn};

/// Events emitted during one summarization call.
#[derive(Debug)]
pub enum SummaryEvent<'a> {
    /// Content selection finished.
    ContentSelected {
        kind: SummaryKind,
        digest_chars: usize,
        used_items: usize,
        used_blocks: usize,
        used_comments: usize,
        access_limited: bool,
    },
    /// Nothing survived the filters; the canonical answer is returned without
    /// calling the model.
    EmptyDigest,
    /// The digest is being condensed chunk by chunk.
    ChunkingStarted { chunks: usize, digest_chars: usize },
    /// Chunk summaries came back.
    ChunkingFinished { kept: usize, condensed_chars: usize },
    /// The main generation call is starting.
    GenerationStarted {
        max_tokens: u32,
        temperature: f32,
        top_p: f32,
    },
    /// A delta from the main generation, as forwarded to the caller.
    TextDelta(&'a str),
    /// The sanitized output was judged.
    Validated(ValidationOutcome),
    /// The answer was synthesized without the model.
    FallbackUsed { reason: UngroundedReason },
    /// The caller cancelled; nothing further runs.
    Cancelled,
}

/// Observer for summarization events.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &SummaryEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```
/// use grounded_rs::events::{EventHandler, FnEventHandler, SummaryEvent};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let deltas = AtomicUsize::new(0);
/// let handler = FnEventHandler::new(|event| {
///     if let SummaryEvent::TextDelta(_) = event {
///         deltas.fetch_add(1, Ordering::Relaxed);
///     }
/// });
/// handler.on_event(&SummaryEvent::TextDelta("hi"));
/// assert_eq!(deltas.load(Ordering::Relaxed), 1);
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&SummaryEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&SummaryEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&SummaryEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &SummaryEvent<'_>) {
        (self.0)(event)
    }
}

/// Maps every event to a `tracing` call.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &SummaryEvent<'_>) {
        match event {
            SummaryEvent::ContentSelected {
                kind,
                digest_chars,
                used_items,
                used_blocks,
                used_comments,
                access_limited,
            } => {
                info!(
                    "Selected {kind} digest: {digest_chars} chars, items={used_items}, \
                     blocks={used_blocks}, comments={used_comments}, access_limited={access_limited}"
                );
            }
            SummaryEvent::EmptyDigest => {
                info!("Digest is empty after filtering; skipping model call");
            }
            SummaryEvent::ChunkingStarted {
                chunks,
                digest_chars,
            } => {
                info!("Condensing {digest_chars}-char digest in {chunks} chunk(s)");
            }
            SummaryEvent::ChunkingFinished {
                kept,
                condensed_chars,
            } => {
                debug!("Kept {kept} chunk summary(ies), condensed digest is {condensed_chars} chars");
            }
            SummaryEvent::GenerationStarted {
                max_tokens,
                temperature,
                top_p,
            } => {
                debug!("Generating: max_tokens={max_tokens}, temp={temperature}, top_p={top_p}");
            }
            SummaryEvent::TextDelta(text) => {
                trace!("delta: {text:?}");
            }
            SummaryEvent::Validated(outcome) => {
                debug!("Validation: {outcome}");
            }
            SummaryEvent::FallbackUsed { reason } => {
                warn!("Model output rejected ({reason}); using synthesized answer");
            }
            SummaryEvent::Cancelled => {
                info!("Summarization cancelled by caller");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn fn_handler_sees_events_in_order() {
        let seen = Mutex::new(Vec::new());
        let handler = FnEventHandler::new(|event| {
            let name = match event {
                SummaryEvent::EmptyDigest => "empty",
                SummaryEvent::Cancelled => "cancelled",
                _ => "other",
            };
            seen.lock().unwrap().push(name);
        });
        handler.on_event(&SummaryEvent::EmptyDigest);
        handler.on_event(&SummaryEvent::TextDelta("x"));
        handler.on_event(&SummaryEvent::Cancelled);
        assert_eq!(*seen.lock().unwrap(), vec!["empty", "other", "cancelled"]);
    }

    #[test]
    fn logging_and_noop_handlers_accept_everything() {
        let events = [
            SummaryEvent::EmptyDigest,
            SummaryEvent::Validated(ValidationOutcome::Grounded),
            SummaryEvent::FallbackUsed {
                reason: UngroundedReason::Empty,
            },
            SummaryEvent::ChunkingStarted {
                chunks: 3,
                digest_chars: 6000,
            },
        ];
        for event in &events {
            LoggingHandler.on_event(event);
            NoopHandler.on_event(event);
        }
    }
}
