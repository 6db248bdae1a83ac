//! Digest builders for each selector branch.

use super::relevance::{is_candidate_block, is_relevant_block, is_relevant_primary};
use super::{CommentEntry, ListEntry, SIGNAL_LOW_SIGNAL_TEXT, SummaryInput, SummaryKind};
use crate::NOT_STATED;
use crate::observation::{GoalPlan, ObservedBlock, ObservedComment, ObservedItem, Observation};
use crate::text::normalize::contains_phrase;
use crate::text::{
    collapse_repeated_tokens, is_low_signal_text, is_ui_heavy, normalize_for_match,
    normalize_whitespace, split_sentences, truncate_chars,
};
use std::collections::HashSet;

// ── Limits ──────────────────────────────────────────────────────────

const MAX_LIST_ITEMS: usize = 24;
const MAX_BLOCKS: usize = 20;
const PRIMARY_SENTENCES: usize = 12;
const BLOCK_SENTENCES: usize = 8;
const MAX_COMMENTS: usize = 40;
const MAX_COMMENT_CHARS: usize = 400;
const MAX_AUTHORS: usize = 8;
const SNIPPET_SEGMENTS: usize = 2;
const MAX_SNIPPET_CHARS: usize = 220;
const MAX_OUTLINE_ENTRIES: usize = 12;

// ── Shared helpers ──────────────────────────────────────────────────

fn header(input: &SummaryInput) -> Vec<String> {
    let mut lines = Vec::new();
    if !input.title.is_empty() {
        lines.push(format!("Title: {}", input.title));
    }
    if !input.url.is_empty() {
        lines.push(format!("URL: {}", input.url));
    }
    lines
}

/// Sentence-level cleanup of one text segment.
///
/// Repetition loops are collapsed, chrome and low-signal sentences dropped,
/// and sentences already emitted by an earlier segment skipped.
fn compact_sentences(text: &str, cap: usize, seen: &mut HashSet<String>) -> Option<String> {
    let mut kept = Vec::new();
    for sentence in split_sentences(text) {
        if kept.len() >= cap {
            break;
        }
        let sentence = collapse_repeated_tokens(&sentence);
        if is_ui_heavy(&sentence) || is_low_signal_text(&sentence) {
            continue;
        }
        let key = normalize_for_match(&sentence);
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        kept.push(sentence);
    }
    (!kept.is_empty()).then(|| kept.join(" "))
}

/// Snippet text with chrome, title echoes, and duplicate segments removed.
fn clean_snippet(snippet: &str, title: &str) -> Option<String> {
    let title_key = normalize_for_match(title);
    let mut seen = HashSet::new();
    let segments: Vec<String> = split_sentences(snippet)
        .iter()
        .flat_map(|s| s.split(" | ").flat_map(|p| p.split(" \u{00B7} ")))
        .map(|s| collapse_repeated_tokens(s.trim()))
        .filter(|s| !s.is_empty() && !is_ui_heavy(s))
        .filter(|s| {
            let key = normalize_for_match(s);
            !key.is_empty() && key != title_key && seen.insert(key)
        })
        .take(SNIPPET_SEGMENTS)
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(truncate_chars(&segments.join(" "), MAX_SNIPPET_CHARS))
}

fn item_title(item: &ObservedItem) -> String {
    collapse_repeated_tokens(&item.title)
}

// ── Comments ────────────────────────────────────────────────────────

fn comment_entry(comment: &ObservedComment) -> Option<CommentEntry> {
    let body = collapse_repeated_tokens(&comment.text);
    if body.is_empty() {
        return None;
    }
    let clean = |v: &Option<String>| {
        v.as_deref()
            .map(normalize_whitespace)
            .filter(|s| !s.is_empty())
    };
    Some(CommentEntry {
        body: truncate_chars(&body, MAX_COMMENT_CHARS),
        author: clean(&comment.author),
        age: clean(&comment.age),
        score: comment.score,
        depth: comment.depth,
    })
}

fn comment_line(index: usize, entry: &CommentEntry) -> String {
    let mut meta: Vec<String> = Vec::new();
    if let Some(author) = &entry.author {
        meta.push(author.clone());
    }
    if let Some(age) = &entry.age {
        meta.push(age.clone());
    }
    if let Some(score) = entry.score {
        meta.push(format!("{score} points"));
    }
    if meta.is_empty() {
        format!("Comment {index}: {}", entry.body)
    } else {
        format!("Comment {index} ({}): {}", meta.join(" \u{00B7} "), entry.body)
    }
}

pub(super) fn comments_digest(observation: &Observation) -> SummaryInput {
    let mut input = SummaryInput::for_page(SummaryKind::Comments, observation);

    let all: Vec<CommentEntry> = observation
        .comments
        .iter()
        .filter_map(comment_entry)
        .collect();
    if all.is_empty() {
        input.set_digest(format!("Comments: {NOT_STATED}"));
        return input;
    }

    let meaningful: Vec<CommentEntry> = all
        .iter()
        .filter(|c| !is_low_signal_text(&c.body))
        .cloned()
        .collect();
    let mut entries = if meaningful.is_empty() { all } else { meaningful };
    entries.truncate(MAX_COMMENTS);

    let mut lines = header(&input);
    lines.push(format!("Comment count: {}", observation.comments.len()));
    let mut authors: Vec<&str> = Vec::new();
    for author in entries.iter().filter_map(|c| c.author.as_deref()) {
        if authors.len() < MAX_AUTHORS && !authors.contains(&author) {
            authors.push(author);
        }
    }
    if !authors.is_empty() {
        lines.push(format!("Authors: {}", authors.join(", ")));
    }
    lines.push(String::new());
    for (i, entry) in entries.iter().enumerate() {
        lines.push(comment_line(i + 1, entry));
    }

    input.used_comments = entries.len();
    input.comment_entries = entries;
    input.set_digest(lines.join("\n"));
    input
}

// ── Item ────────────────────────────────────────────────────────────

/// Resolve the targeted item: 1-based index first, then the first title that
/// contains the normalized query.
fn resolve_target_item<'o>(
    observation: &'o Observation,
    plan: &GoalPlan,
) -> Option<(usize, &'o ObservedItem)> {
    if let Some(index) = plan.item_index
        && index >= 1
        && let Some(item) = observation.items.get(index - 1)
    {
        return Some((index, item));
    }
    let query = normalize_for_match(plan.item_query.as_deref().unwrap_or_default());
    if query.is_empty() {
        return None;
    }
    observation
        .items
        .iter()
        .enumerate()
        .find(|(_, item)| contains_phrase(&normalize_for_match(&item.title), &query))
        .map(|(i, item)| (i + 1, item))
}

/// Block text that talks about the item, when the page renders more than the
/// list row.
fn item_details(observation: &Observation, title: &str) -> (Option<String>, usize) {
    let title_key = normalize_for_match(title);
    if title_key.is_empty() {
        return (None, 0);
    }
    let mentions = |block: &ObservedBlock| contains_phrase(&normalize_for_match(&block.text), &title_key);

    let mut seen = HashSet::new();
    let mut segments = Vec::new();
    let mut used = 0;
    let primary = observation
        .primary
        .iter()
        .filter(|p| is_relevant_primary(p) && mentions(*p));
    let blocks = observation
        .blocks
        .iter()
        .filter(|b| is_relevant_block(b) && mentions(*b));
    for block in primary.chain(blocks).take(MAX_BLOCKS) {
        if let Some(text) = compact_sentences(&block.text, BLOCK_SENTENCES, &mut seen) {
            segments.push(text);
            used += 1;
        }
    }
    let joined = segments.join(" ");
    if joined.is_empty() || is_low_signal_text(&joined) {
        (None, 0)
    } else {
        (Some(joined), used)
    }
}

pub(super) fn item_digest(observation: &Observation, plan: &GoalPlan) -> Option<SummaryInput> {
    let (position, item) = resolve_target_item(observation, plan)?;
    let title = item_title(item);
    if title.is_empty() {
        return None;
    }

    let mut input = SummaryInput::for_page(SummaryKind::Item, observation);
    if let Some(url) = item.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        input.url = url.to_string();
    }
    let mut lines = header(&input);
    lines.push(format!("Position: {position} of {}", observation.items.len()));
    lines.push(format!("Item: {title}"));

    let (details, used_blocks) = item_details(observation, &title);
    let snippet = item.snippet.as_deref().and_then(|s| clean_snippet(s, &title));
    match (&details, &snippet) {
        (Some(details), _) => lines.push(format!("Details: {details}")),
        (None, Some(snippet)) => lines.push(format!("Snippet: {snippet}")),
        (None, None) => {}
    }

    input.used_items = 1;
    input.used_blocks = used_blocks;
    input.list_entries = vec![ListEntry {
        title: title.clone(),
        detail: details.or(snippet),
        url: item.url.clone(),
    }];
    input.item_title = Some(title);
    input.set_digest(lines.join("\n"));
    Some(input)
}

// ── List ────────────────────────────────────────────────────────────

pub(super) fn list_digest(observation: &Observation) -> Option<SummaryInput> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for item in &observation.items {
        if entries.len() >= MAX_LIST_ITEMS {
            break;
        }
        let title = item_title(item);
        if title.is_empty() || is_ui_heavy(&title) || !seen.insert(normalize_for_match(&title)) {
            continue;
        }
        entries.push(ListEntry {
            detail: item.snippet.as_deref().and_then(|s| clean_snippet(s, &title)),
            url: item.url.clone(),
            title,
        });
    }
    if entries.is_empty() {
        return None;
    }

    let mut input = SummaryInput::for_page(SummaryKind::List, observation);
    let mut lines = header(&input);
    lines.push(format!("Observed items: {}", observation.items.len()));
    lines.push(String::new());
    for (i, entry) in entries.iter().enumerate() {
        match &entry.detail {
            Some(detail) => lines.push(format!("{}. {} \u{2014} {detail}", i + 1, entry.title)),
            None => lines.push(format!("{}. {}", i + 1, entry.title)),
        }
    }

    input.used_items = entries.len();
    input.list_entries = entries;
    input.set_digest(lines.join("\n"));
    Some(input)
}

// ── Page text ───────────────────────────────────────────────────────

fn outline_line(observation: &Observation) -> Option<String> {
    let mut seen = HashSet::new();
    let headings: Vec<String> = observation
        .outline
        .iter()
        .map(|e| normalize_whitespace(&e.text))
        .filter(|t| !t.is_empty() && !is_ui_heavy(t) && seen.insert(normalize_for_match(t)))
        .take(MAX_OUTLINE_ENTRIES)
        .collect();
    (!headings.is_empty()).then(|| format!("Outline: {}", headings.join("; ")))
}

pub(super) fn page_text_digest(observation: &Observation) -> SummaryInput {
    let mut input = SummaryInput::for_page(SummaryKind::PageText, observation);
    let mut seen = HashSet::new();
    let mut segments: Vec<String> = Vec::new();

    let primary = observation.primary.as_ref().filter(|p| is_relevant_primary(p));
    if let Some(primary) = primary
        && let Some(text) = compact_sentences(&primary.text, PRIMARY_SENTENCES, &mut seen)
    {
        segments.push(text);
        input.used_primary = true;
    }

    let primary_key = primary.map(|p| normalize_whitespace(&p.text));
    let candidates: Vec<&ObservedBlock> = observation
        .blocks
        .iter()
        .filter(|b| is_candidate_block(b))
        .collect();
    for block in candidates.iter().filter(|b| !is_low_signal_text(&b.text)) {
        if input.used_blocks >= MAX_BLOCKS {
            break;
        }
        if primary_key.as_deref() == Some(normalize_whitespace(&block.text).as_str()) {
            continue;
        }
        if let Some(text) = compact_sentences(&block.text, BLOCK_SENTENCES, &mut seen) {
            segments.push(text);
            input.used_blocks += 1;
        }
    }

    if !input.used_primary
        && !candidates.is_empty()
        && candidates.iter().all(|b| is_low_signal_text(&b.text))
    {
        input.access_signals.push(SIGNAL_LOW_SIGNAL_TEXT.to_string());
    }

    if segments.is_empty() {
        if let Some(outline) = outline_line(observation) {
            segments.push(outline);
        } else if let Some(text) = compact_sentences(&observation.text, PRIMARY_SENTENCES, &mut seen)
        {
            segments.push(text);
        }
    }
    if segments.is_empty() {
        return input;
    }

    let mut lines = header(&input);
    lines.push(String::new());
    lines.extend(segments);
    input.set_digest(lines.join("\n"));
    input
}
