//! Output sanitization and grounding validation.
//!
//! [`sanitize_output`] cleans raw model text once the stream has drained;
//! [`validate_output`] then runs an ordered list of reject rules against the
//! digest the model was shown. The first failing rule decides. There is no
//! retry: an ungrounded answer goes straight to the fallback synthesizer.

pub mod anchors;

pub use anchors::{anchor_matches, extract_anchors, required_anchor_matches};

use crate::NOT_STATED;
use crate::observation::{GoalPlan, Intent};
use crate::select::{SIGNAL_CHUNKED_INPUT, SummaryInput, SummaryKind};
use crate::stream::resolve_replacements;
use crate::text::normalize::contains_phrase;
use crate::text::{
    collapse_repeated_tokens, content_tokens, normalize_for_match, normalize_preserving_newlines,
};
use anchors::strip_list_number;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

// ── Rule tables ─────────────────────────────────────────────────────

/// Substrings that reveal the prompt scaffolding or a jailbreak echo.
const LEAKAGE_PHRASES: &[&str] = &[
    "untrusted",
    "system prompt",
    "safety policy",
    "do not follow",
    "do not trust",
];

/// Template slots matched on normalized token boundaries.
const PLACEHOLDER_PHRASES: &[&str] = &[
    "item n",
    "title n",
    "comment n",
    "overview paragraph",
    "detail sentence",
    "lorem ipsum",
];

/// Bracketed slots matched literally (lowercased).
const PLACEHOLDER_LITERALS: &[&str] = &[
    "<item",
    "[item",
    "{item",
    "<title>",
    "[title]",
    "{title}",
    "[insert",
    "<insert",
];

const COMMENT_LABEL_ECHOES: &[&str] = &["comment 1:", "comment 2:"];

const MIN_REPETITION_TOKENS: usize = 30;
const MIN_UNIQUE_RATIO: f64 = 0.4;
const OVERLAP_MIN_DIGEST_CHARS: usize = 260;
const OVERLAP_MIN_OUTPUT_TOKENS: usize = 12;
const NO_ANCHOR_MAX_DIGEST_CHARS: usize = 200;

// ── Outcome ─────────────────────────────────────────────────────────

/// Which rule rejected an answer.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UngroundedReason {
    Empty,
    Leakage,
    Placeholder,
    ItemTitleMissing,
    CommentLabelEcho,
    CommentsNotStated,
    ListLinesMissing,
    Repetitive,
    LowOverlap,
    NoAnchors,
    AnchorsMissing,
}

impl fmt::Display for UngroundedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UngroundedReason::Empty => "empty output",
            UngroundedReason::Leakage => "prompt leakage",
            UngroundedReason::Placeholder => "template placeholder",
            UngroundedReason::ItemTitleMissing => "item title missing",
            UngroundedReason::CommentLabelEcho => "raw comment labels",
            UngroundedReason::CommentsNotStated => "comments marked not stated",
            UngroundedReason::ListLinesMissing => "too few numbered lines",
            UngroundedReason::Repetitive => "repetitive output",
            UngroundedReason::LowOverlap => "low token overlap",
            UngroundedReason::NoAnchors => "no anchors to check",
            UngroundedReason::AnchorsMissing => "too few anchors matched",
        };
        f.write_str(s)
    }
}

/// Result of validating one answer.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum ValidationOutcome {
    #[serde(rename = "ok")]
    Grounded,
    Ungrounded(UngroundedReason),
}

impl ValidationOutcome {
    pub fn is_grounded(&self) -> bool {
        matches!(self, ValidationOutcome::Grounded)
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationOutcome::Grounded => f.write_str("ok"),
            ValidationOutcome::Ungrounded(reason) => write!(f, "ungrounded ({reason})"),
        }
    }
}

// ── Sanitization ────────────────────────────────────────────────────

/// Byte offset of `needle` in `haystack`, ignoring ASCII case.
fn find_ascii_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    (from..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Remove `<think>...</think>` reasoning blocks.
///
/// An unterminated opening tag drops the rest of the text. A closing tag
/// with no opener drops everything before it (the opener was in the prompt).
pub fn strip_think_blocks(text: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";
    let mut out = text.to_string();
    while let Some(start) = find_ascii_ci(&out, OPEN, 0) {
        match find_ascii_ci(&out, CLOSE, start + OPEN.len()) {
            Some(end) => out.replace_range(start..end + CLOSE.len(), ""),
            None => out.truncate(start),
        }
    }
    let mut last_close = None;
    let mut from = 0;
    while let Some(pos) = find_ascii_ci(&out, CLOSE, from) {
        last_close = Some(pos);
        from = pos + CLOSE.len();
    }
    match last_close {
        Some(pos) => out.split_off(pos + CLOSE.len()),
        None => out,
    }
}

/// `Label: body` with a short label.
fn split_label(line: &str) -> Option<(&str, &str)> {
    let (label, body) = line.split_once(':')?;
    let label = label.trim();
    let body = body.trim();
    let words = label.split_whitespace().count();
    (!label.is_empty() && !body.is_empty() && words <= 4 && label.chars().count() <= 40)
        .then_some((label, body))
}

/// Clean raw model output before validation.
///
/// Strips reasoning blocks, resolves replacement markers, drops code-fence
/// lines, collapses repeated token windows per line, and dedupes identical
/// lines: a repeated `Label: body` line keeps its label with the body
/// replaced by the not-stated phrase, any other repeated line is removed.
pub fn sanitize_output(raw: &str) -> String {
    let stripped = strip_think_blocks(raw);
    let resolved = resolve_replacements(&stripped);
    let normalized = normalize_preserving_newlines(resolved);

    let mut seen: HashSet<String> = HashSet::new();
    let mut lines: Vec<String> = Vec::new();
    for line in normalized.lines() {
        if line.trim_start().starts_with("```") {
            continue;
        }
        let indent_len = line.len() - line.trim_start().len();
        let (indent, body) = line.split_at(indent_len);
        let body = collapse_repeated_tokens(body);
        if body.is_empty() {
            lines.push(String::new());
            continue;
        }
        let key = normalize_for_match(&body);
        if key.is_empty() || seen.insert(key) {
            lines.push(format!("{indent}{body}"));
            continue;
        }
        if let Some((label, _)) = split_label(&body) {
            let replaced = format!("{label}: {NOT_STATED}");
            if seen.insert(normalize_for_match(&replaced)) {
                lines.push(format!("{indent}{replaced}"));
            }
        }
    }
    normalize_preserving_newlines(&lines.join("\n"))
}

// ── Validation ──────────────────────────────────────────────────────

fn item_title_shared(output_tokens: &HashSet<String>, title: &str) -> bool {
    let title_tokens: HashSet<String> = content_tokens(title).into_iter().collect();
    if title_tokens.is_empty() {
        return true;
    }
    let required = if title_tokens.len() >= 4 { 2 } else { 1 };
    title_tokens.intersection(output_tokens).count() >= required
}

fn overlap_threshold(kind: SummaryKind) -> f64 {
    match kind {
        SummaryKind::Comments => 0.30,
        SummaryKind::Item | SummaryKind::PageText => 0.38,
        SummaryKind::List => 0.10,
    }
}

/// Judge a sanitized answer against the digest it was generated from.
pub fn validate_output(output: &str, input: &SummaryInput, plan: &GoalPlan) -> ValidationOutcome {
    use UngroundedReason::*;
    let reject = ValidationOutcome::Ungrounded;

    let trimmed = output.trim();
    if trimmed.is_empty() {
        return reject(Empty);
    }

    let lower = trimmed.to_lowercase();
    if LEAKAGE_PHRASES.iter().any(|p| lower.contains(p)) {
        return reject(Leakage);
    }

    let normalized = normalize_for_match(trimmed);
    if PLACEHOLDER_LITERALS.iter().any(|p| lower.contains(p))
        || PLACEHOLDER_PHRASES
            .iter()
            .any(|p| contains_phrase(&normalized, p))
    {
        return reject(Placeholder);
    }

    let output_tokens: HashSet<String> = content_tokens(trimmed).into_iter().collect();
    let kind = input.kind();

    if kind == SummaryKind::Item && plan.intent == Intent::ItemSummary {
        let title = input.item_title.as_deref().unwrap_or(&input.title);
        if !item_title_shared(&output_tokens, title) {
            return reject(ItemTitleMissing);
        }
    }

    if kind == SummaryKind::Comments {
        if COMMENT_LABEL_ECHOES.iter().any(|p| lower.contains(p)) {
            return reject(CommentLabelEcho);
        }
        let not_stated = NOT_STATED.trim_end_matches('.').to_lowercase();
        if input.used_comments >= 3 && lower.matches(not_stated.as_str()).count() >= 2 {
            return reject(CommentsNotStated);
        }
    }

    if kind == SummaryKind::List {
        let numbered = trimmed
            .lines()
            .filter(|l| strip_list_number(l.trim_start()).is_some())
            .count();
        if numbered < input.used_items.min(5) {
            return reject(ListLinesMissing);
        }
    }

    let all_tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
    if all_tokens.len() >= MIN_REPETITION_TOKENS {
        let unique: HashSet<&str> = all_tokens.iter().copied().collect();
        if (unique.len() as f64 / all_tokens.len() as f64) < MIN_UNIQUE_RATIO {
            return reject(Repetitive);
        }
    }

    let digest_chars = input.digest_chars();
    let overlap_gate = !input.access_limited
        && kind != SummaryKind::List
        && !input.has_signal(SIGNAL_CHUNKED_INPUT)
        && digest_chars >= OVERLAP_MIN_DIGEST_CHARS
        && output_tokens.len() >= OVERLAP_MIN_OUTPUT_TOKENS;
    if overlap_gate {
        let digest_tokens: HashSet<String> = content_tokens(&input.text).into_iter().collect();
        let shared = output_tokens.intersection(&digest_tokens).count();
        let ratio = shared as f64 / output_tokens.len() as f64;
        if ratio < overlap_threshold(kind) {
            return reject(LowOverlap);
        }
    }

    let anchors = extract_anchors(input);
    if anchors.is_empty() {
        return if input.access_limited || digest_chars < NO_ANCHOR_MAX_DIGEST_CHARS {
            ValidationOutcome::Grounded
        } else {
            reject(NoAnchors)
        };
    }
    let required = required_anchor_matches(input).min(anchors.len());
    let matched = anchors
        .iter()
        .filter(|a| anchor_matches(a, &normalized))
        .count();
    if matched < required {
        return reject(AnchorsMissing);
    }
    ValidationOutcome::Grounded
}
