//! Content selection: turning an [`Observation`] into the digest the model sees.
//!
//! [`select_content`] runs the branches in a fixed order, each terminal:
//!
//! 1. **Comments**: the plan wants comments. Uses the comment thread, or a
//!    single `Comments: Not stated in the page.` line when there is none.
//! 2. **Item**: an item summary on a list-like page whose target item
//!    resolves (by 1-based index, else by title substring).
//! 3. **List**: a list-like page with usable items.
//! 4. **Page text**: primary content, relevant blocks, then the outline or
//!    the flattened page text as fallbacks. Item-summary plans on pages that
//!    are not list-like get this digest too; the prompt format and the
//!    fallback follow the plan's intent, not the kind.
//!
//! Access-limited detection runs only for the fourth branch.

mod access;
mod digest;
mod relevance;

pub use access::{ACCESS_AUTH_FIELDS, ACCESS_LOW_VISIBLE_TEXT, ACCESS_OVERLAY_OR_DIALOG};
pub use relevance::{is_relevant_block, is_relevant_primary, looks_like_list};

use crate::observation::{GoalPlan, Intent, Observation};
use serde::Serialize;
use std::fmt;

/// Hard cap on digest length in characters.
pub const MAX_DIGEST_CHARS: usize = 9000;

/// Signal tag: the digest was rewritten by chunked map-reduce.
pub const SIGNAL_CHUNKED_INPUT: &str = "chunked_input";

/// Signal tag: every candidate block was rejected as low-signal.
pub const SIGNAL_LOW_SIGNAL_TEXT: &str = "low_signal_text";

/// Digest line labels that carry context rather than page content.
pub const METADATA_LABELS: &[&str] = &[
    "Title",
    "URL",
    "Observed items",
    "Item count",
    "Position",
    "Comment count",
    "Authors",
    "Outline",
];

/// What the digest is made of. Set once per request.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SummaryKind {
    List,
    Item,
    PageText,
    Comments,
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryKind::List => write!(f, "list"),
            SummaryKind::Item => write!(f, "item"),
            SummaryKind::PageText => write!(f, "pageText"),
            SummaryKind::Comments => write!(f, "comments"),
        }
    }
}

/// One numbered entry of a list digest.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ListEntry {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One comment as it appears in a comments digest.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CommentEntry {
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    pub depth: u32,
}

/// The selected, cleaned content for one summarization request.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SummaryInput {
    kind: SummaryKind,
    /// The digest shown to the model (at most [`MAX_DIGEST_CHARS`]).
    pub text: String,
    /// The digest as first extracted. Differs from `text` only after chunking;
    /// fallback synthesis always reads this one.
    pub source_text: String,
    pub title: String,
    pub url: String,
    /// Title of the targeted item (item kind only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_title: Option<String>,
    pub used_items: usize,
    pub used_blocks: usize,
    pub used_comments: usize,
    pub used_primary: bool,
    pub access_limited: bool,
    pub access_signals: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub list_entries: Vec<ListEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comment_entries: Vec<CommentEntry>,
}

impl SummaryInput {
    pub fn new(kind: SummaryKind, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            kind,
            source_text: text.clone(),
            text,
            title: String::new(),
            url: String::new(),
            item_title: None,
            used_items: 0,
            used_blocks: 0,
            used_comments: 0,
            used_primary: false,
            access_limited: false,
            access_signals: Vec::new(),
            list_entries: Vec::new(),
            comment_entries: Vec::new(),
        }
    }

    pub(crate) fn for_page(kind: SummaryKind, observation: &Observation) -> Self {
        let mut input = Self::new(kind, String::new());
        input.title = crate::text::normalize_whitespace(&observation.title);
        input.url = observation.url.trim().to_string();
        input
    }

    pub(crate) fn set_digest(&mut self, text: String) {
        let text = cap_digest(&text);
        self.source_text = text.clone();
        self.text = text;
    }

    pub fn kind(&self) -> SummaryKind {
        self.kind
    }

    pub fn has_signal(&self, tag: &str) -> bool {
        self.access_signals.iter().any(|s| s == tag)
    }

    pub fn is_chunked(&self) -> bool {
        self.has_signal(SIGNAL_CHUNKED_INPUT)
    }

    pub fn digest_chars(&self) -> usize {
        self.text.chars().count()
    }

    /// A copy carrying a condensed digest. Kind, counters, and extracted
    /// structures are kept; `source_text` still holds the original digest.
    pub fn with_condensed_text(&self, text: String) -> Self {
        let mut condensed = self.clone();
        condensed.text = cap_digest(&text);
        if !condensed.is_chunked() {
            condensed.access_signals.push(SIGNAL_CHUNKED_INPUT.to_string());
        }
        condensed
    }
}

/// Split a `Label: value` digest line when the label is a metadata label.
pub fn metadata_value(line: &str) -> Option<(&'static str, &str)> {
    METADATA_LABELS.iter().find_map(|label| {
        line.strip_prefix(label)
            .and_then(|rest| rest.strip_prefix(':'))
            .map(|value| (*label, value.trim()))
    })
}

/// Digest lines that carry page content (metadata lines and blanks removed).
pub fn content_lines(digest: &str) -> impl Iterator<Item = &str> {
    digest
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && metadata_value(l).is_none())
}

/// Cut a digest to [`MAX_DIGEST_CHARS`], preferring a line boundary.
fn cap_digest(text: &str) -> String {
    if text.chars().count() <= MAX_DIGEST_CHARS {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for line in text.lines() {
        let len = line.chars().count() + usize::from(!out.is_empty());
        if used + len > MAX_DIGEST_CHARS {
            break;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
        used += len;
    }
    if out.is_empty() {
        out = text.chars().take(MAX_DIGEST_CHARS).collect();
    }
    out
}

/// Select and extract the digest for one request.
pub fn select_content(observation: &Observation, plan: &GoalPlan) -> SummaryInput {
    if plan.wants_comments() {
        return digest::comments_digest(observation);
    }

    let list_like = looks_like_list(observation);
    if plan.intent == Intent::ItemSummary
        && list_like
        && let Some(input) = digest::item_digest(observation, plan)
    {
        return input;
    }
    if list_like
        && !observation.items.is_empty()
        && let Some(input) = digest::list_digest(observation)
    {
        return input;
    }

    let mut input = digest::page_text_digest(observation);
    if !list_like {
        access::apply_access_limits(observation, &mut input);
    }
    input
}
