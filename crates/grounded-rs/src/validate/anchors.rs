//! Anchors: short normalized fragments of the digest that a grounded answer
//! is expected to repeat.

use crate::select::{SIGNAL_LOW_SIGNAL_TEXT, SummaryInput, SummaryKind, content_lines};
use crate::text::{is_low_signal_text, normalize_for_match, split_sentences};
use crate::text::normalize::contains_phrase;

const LIST_ANCHORS: usize = 8;
const ITEM_ANCHORS: usize = 2;
const COMMENT_ANCHORS: usize = 6;
const PAGE_TEXT_ANCHORS: usize = 3;

/// Longest anchor kept, in tokens.
const MAX_ANCHOR_TOKENS: usize = 12;
/// Tokens in an anchor prefix match.
const PREFIX_TOKENS: usize = 6;
/// A prefix shorter than this (chars) is too generic to count.
const MIN_PREFIX_CHARS: usize = 12;

fn anchor_from(text: &str) -> Option<String> {
    let norm = normalize_for_match(text);
    let tokens: Vec<&str> = norm.split(' ').filter(|t| !t.is_empty()).collect();
    if tokens.is_empty() {
        return None;
    }
    Some(tokens[..tokens.len().min(MAX_ANCHOR_TOKENS)].join(" "))
}

/// `N. ` prefix of a numbered line, returning the rest.
pub(crate) fn strip_list_number(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = line.get(digits..)?.strip_prefix('.')?;
    rest.starts_with(char::is_whitespace).then(|| rest.trim_start())
}

fn list_anchors(digest: &str) -> Vec<String> {
    content_lines(digest)
        .filter_map(strip_list_number)
        .map(|rest| rest.split_once(" \u{2014} ").map_or(rest, |(title, _)| title))
        .filter_map(anchor_from)
        .take(LIST_ANCHORS)
        .collect()
}

fn item_anchors(input: &SummaryInput) -> Vec<String> {
    let mut anchors = Vec::new();
    let mut detail = None;
    for line in content_lines(&input.text) {
        if let Some(title) = line.strip_prefix("Item:") {
            anchors.extend(anchor_from(title));
        } else if let Some(text) = line
            .strip_prefix("Details:")
            .or_else(|| line.strip_prefix("Snippet:"))
        {
            detail = split_sentences(text).into_iter().next();
        }
    }
    if anchors.is_empty()
        && let Some(title) = &input.item_title
    {
        anchors.extend(anchor_from(title));
    }
    anchors.extend(detail.as_deref().and_then(anchor_from));
    anchors.truncate(ITEM_ANCHORS);
    anchors
}

/// Leading clause of a comment body, with its `Comment N (meta):` header removed.
fn comment_anchors(digest: &str) -> Vec<String> {
    content_lines(digest)
        .filter(|l| l.starts_with("Comment "))
        .filter_map(|l| l.split_once(": ").map(|(_, body)| body))
        .filter_map(|body| {
            let clause = body
                .split(['.', ',', ';', ':', '!', '?'])
                .map(str::trim)
                .find(|c| !c.is_empty())?;
            anchor_from(clause)
        })
        .filter(|a| a.split(' ').count() >= 2)
        .take(COMMENT_ANCHORS)
        .collect()
}

fn page_text_anchors(digest: &str) -> Vec<String> {
    content_lines(digest)
        .flat_map(split_sentences)
        .filter(|s| !is_low_signal_text(s))
        .filter_map(|s| anchor_from(&s))
        .filter(|a| a.split(' ').count() >= 3)
        .take(PAGE_TEXT_ANCHORS)
        .collect()
}

/// Anchors for a digest, by kind.
pub fn extract_anchors(input: &SummaryInput) -> Vec<String> {
    match input.kind() {
        SummaryKind::List => list_anchors(&input.text),
        SummaryKind::Item => item_anchors(input),
        SummaryKind::Comments => comment_anchors(&input.text),
        SummaryKind::PageText => page_text_anchors(&input.text),
    }
}

/// How many anchors a grounded answer must hit, before capping at the
/// number of anchors actually extracted.
pub fn required_anchor_matches(input: &SummaryInput) -> usize {
    let digest_chars = input.digest_chars();
    match input.kind() {
        SummaryKind::List => input.used_items.min(5).max(2),
        SummaryKind::Comments => input.used_comments.min(3),
        SummaryKind::Item => {
            if digest_chars > 500 {
                2
            } else {
                1
            }
        }
        SummaryKind::PageText => {
            if input.is_chunked() || input.has_signal(SIGNAL_LOW_SIGNAL_TEXT) {
                1
            } else if digest_chars > 700 {
                3
            } else {
                1
            }
        }
    }
}

/// Whether `normalized_output` (already [`normalize_for_match`]ed) contains
/// the anchor or its six-token prefix.
pub fn anchor_matches(anchor: &str, normalized_output: &str) -> bool {
    if contains_phrase(normalized_output, anchor) {
        return true;
    }
    let prefix: Vec<&str> = anchor.split(' ').take(PREFIX_TOKENS).collect();
    let prefix = prefix.join(" ");
    prefix.chars().count() >= MIN_PREFIX_CHARS && contains_phrase(normalized_output, &prefix)
}
