//! Chunked map-reduce condensation of oversized digests.
//!
//! A long page-text or item digest is split into at most four chunks, each
//! chunk is summarized by an independent short model call, and the surviving
//! summaries are stitched back together in chunk order under the original
//! `Title:`/`URL:` header. Content past the last chunk is not summarized.

use crate::config::ChunkConfig;
use crate::model::{GenerationRequest, ModelError, StreamingModelRunner, collect_text};
use crate::select::{SummaryInput, SummaryKind, metadata_value};
use crate::text::{normalize_for_match, split_sentences};
use crate::validate::sanitize_output;
use futures::future::join_all;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const CHUNK_SYSTEM_PROMPT: &str = "You condense one section of a web page. Write 2 to 4 plain \
    sentences that keep the concrete facts, names, and numbers from the section. Use only the \
    section text. Do not add headings, lists, or commentary.";

/// Whether a digest is condensed before the main call.
pub fn should_chunk(input: &SummaryInput, config: &ChunkConfig) -> bool {
    !matches!(input.kind(), SummaryKind::List | SummaryKind::Comments)
        && !input.access_limited
        && input.digest_chars() >= config.trigger_chars
}

/// Split a digest body into at most `max_chunks` chunks of at most
/// `chunk_chars` characters.
///
/// `Title:`/`URL:` header lines are left out. Non-empty lines are packed
/// greedily; a line longer than the limit is split at sentence boundaries,
/// and a single over-long sentence is cut by characters.
pub fn split_into_chunks(text: &str, chunk_chars: usize, max_chunks: usize) -> Vec<String> {
    let limit = chunk_chars.max(1);
    let mut pieces: Vec<String> = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if matches!(metadata_value(line), Some(("Title" | "URL", _))) {
            continue;
        }
        if line.chars().count() <= limit {
            pieces.push(line.to_string());
            continue;
        }
        for sentence in split_sentences(line) {
            if sentence.chars().count() <= limit {
                pieces.push(sentence);
            } else {
                pieces.extend(hard_split(&sentence, limit));
            }
        }
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for piece in pieces {
        let len = piece.chars().count();
        let joined_len = if current.is_empty() { len } else { current_len + 1 + len };
        if !current.is_empty() && joined_len > limit {
            chunks.push(std::mem::take(&mut current));
            if chunks.len() >= max_chunks {
                return chunks;
            }
            current_len = 0;
        }
        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(&piece);
        current_len += len;
    }
    if !current.is_empty() && chunks.len() < max_chunks {
        chunks.push(current);
    }
    chunks
}

fn hard_split(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit)
        .map(|c| c.iter().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// How chunk condensation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// At least one chunk summary survived.
    Condensed { text: String, kept: usize },
    /// No summary survived; keep the original digest.
    Unchanged,
    /// The caller cancelled while chunk calls were in flight.
    Cancelled,
}

fn chunk_request(
    input: &SummaryInput,
    chunk: &str,
    index: usize,
    total: usize,
    config: &ChunkConfig,
) -> GenerationRequest {
    let section = format!("Section {} of {total}:\n{chunk}", index + 1);
    let user = if input.title.is_empty() {
        section
    } else {
        format!("Page title: {}\n{section}", input.title)
    };
    GenerationRequest {
        system_prompt: CHUNK_SYSTEM_PROMPT.to_string(),
        user_prompt: user,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        top_p: config.top_p,
        repetition_penalty: None,
        repetition_context_size: 0,
        enable_thinking: false,
    }
}

/// Summarize chunks concurrently and reassemble them in chunk order.
///
/// Calls are issued together and awaited with `join_all`, which keeps
/// results in input order. A failed chunk is dropped unless the backend is
/// unavailable, which fails the whole request. Cancelling `cancel` drops all
/// in-flight calls.
pub async fn summarize_chunks(
    runner: &dyn StreamingModelRunner,
    input: &SummaryInput,
    chunks: &[String],
    config: &ChunkConfig,
    cancel: &CancellationToken,
) -> Result<ChunkOutcome, ModelError> {
    let calls = chunks.iter().enumerate().map(|(i, chunk)| {
        let request = chunk_request(input, chunk, i, chunks.len(), config);
        collect_text(runner.stream_text(request))
    });

    let results = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Chunk summarization cancelled");
            return Ok(ChunkOutcome::Cancelled);
        }
        results = join_all(calls) => results,
    };

    let title_key = normalize_for_match(&input.title);
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for (i, result) in results.into_iter().enumerate() {
        let summary = match result {
            Ok(text) => sanitize_output(&text),
            Err(e @ ModelError::Unavailable(_)) => return Err(e),
            Err(e) => {
                warn!("Chunk {} summary failed, dropping it: {e}", i + 1);
                continue;
            }
        };
        let key = normalize_for_match(&summary);
        if summary.chars().count() < config.min_summary_chars {
            debug!("Chunk {} summary too short ({} chars)", i + 1, summary.chars().count());
            continue;
        }
        if key == title_key || !seen.insert(key) {
            debug!("Chunk {} summary repeats earlier text", i + 1);
            continue;
        }
        kept.push(summary);
    }

    if kept.is_empty() {
        return Ok(ChunkOutcome::Unchanged);
    }
    let mut lines = Vec::new();
    if !input.title.is_empty() {
        lines.push(format!("Title: {}", input.title));
    }
    if !input.url.is_empty() {
        lines.push(format!("URL: {}", input.url));
    }
    let header = lines.join("\n");
    let body = kept.join("\n\n");
    let text = if header.is_empty() {
        body
    } else {
        format!("{header}\n\n{body}")
    };
    Ok(ChunkOutcome::Condensed {
        text,
        kept: kept.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::scripted::ScriptedRunner;

    fn numbered_sentences(n: usize) -> String {
        (0..n)
            .map(|i| format!("Sentence number {i} describes a distinct fact about the harbor project."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn trigger_respects_kind_access_and_length() {
        let config = ChunkConfig::default();
        let long = "x".repeat(3200);
        assert!(should_chunk(&SummaryInput::new(SummaryKind::PageText, long.clone()), &config));
        assert!(should_chunk(&SummaryInput::new(SummaryKind::Item, long.clone()), &config));
        assert!(!should_chunk(&SummaryInput::new(SummaryKind::List, long.clone()), &config));
        assert!(!should_chunk(&SummaryInput::new(SummaryKind::Comments, long.clone()), &config));
        assert!(!should_chunk(&SummaryInput::new(SummaryKind::PageText, "x".repeat(3199)), &config));
        let mut limited = SummaryInput::new(SummaryKind::PageText, long);
        limited.access_limited = true;
        assert!(!should_chunk(&limited, &config));
    }

    #[test]
    fn long_line_is_split_by_sentence_and_capped() {
        let text = format!("Title: Harbor\nURL: https://h.example\n\n{}", numbered_sentences(90));
        assert!(text.chars().count() > 6000);
        let chunks = split_into_chunks(&text, 2200, 4);
        assert!(chunks.len() <= 4);
        assert!(chunks.iter().all(|c| c.chars().count() <= 2200));
        assert!(!chunks[0].contains("Title:"));
        assert!(chunks[0].starts_with("Sentence number 0 "));
        // Chunks keep source order.
        let firsts: Vec<usize> = chunks
            .iter()
            .map(|c| text.find(c.lines().next().unwrap()).unwrap())
            .collect();
        assert!(firsts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn overlong_sentence_is_hard_split() {
        let chunks = split_into_chunks(&"a".repeat(5000), 2200, 4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].chars().count(), 600);
    }

    #[tokio::test]
    async fn summaries_are_filtered_and_kept_in_order() {
        let mut input = SummaryInput::new(SummaryKind::PageText, "digest");
        input.title = "Harbor Project".into();
        input.url = "https://h.example".into();
        let chunks: Vec<String> = (0..4).map(|i| format!("chunk {i}")).collect();
        let first = "The harbor expansion adds two deep-water berths and a new rail spur for freight.";
        let runner = ScriptedRunner::new()
            .with_response(first)
            .with_response("Too short.")
            .with_response(first)
            .with_failure(ModelError::InvalidResponse("truncated".into()));
        let outcome = summarize_chunks(&runner, &input, &chunks, &ChunkConfig::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ChunkOutcome::Condensed {
                text: format!("Title: Harbor Project\nURL: https://h.example\n\n{first}"),
                kept: 1,
            }
        );
        assert_eq!(runner.call_count(), 4);
    }

    #[tokio::test]
    async fn unavailable_backend_fails_the_request() {
        let input = SummaryInput::new(SummaryKind::PageText, "digest");
        let runner = ScriptedRunner::new().with_failure(ModelError::Unavailable("down".into()));
        let result = summarize_chunks(&runner, &input, &["c".to_string()], &ChunkConfig::default(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(ModelError::Unavailable(_))));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let input = SummaryInput::new(SummaryKind::PageText, "digest");
        let runner = ScriptedRunner::new().with_response("unused");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = summarize_chunks(&runner, &input, &["c".to_string()], &ChunkConfig::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, ChunkOutcome::Cancelled);
    }
}
