//! Page observations and goal plans supplied by upstream collaborators.
//!
//! An [`Observation`] is a structured snapshot of one page produced by the
//! DOM extractor; a [`GoalPlan`] is the intent classifier's reading of the
//! user's question. Both are consumed read-only for the duration of one
//! summarization call. Field names serialize in camelCase to match the
//! extractor's wire format.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One entry of a list-like page (search result, feed story, product card).
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ObservedItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Number of links inside the item's container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_count: Option<u32>,
    /// Comment count shown next to the item, when the page displays one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<u32>,
}

impl ObservedItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// A block-level text container (paragraph, section, article, dialog...).
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ObservedBlock {
    /// Lowercase HTML tag name.
    pub tag: String,
    /// ARIA role, if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub text: String,
    /// Fraction of the block's text that sits inside links (0.0 - 1.0).
    pub link_density: f64,
    pub link_count: u32,
}

impl ObservedBlock {
    pub fn new(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_links(mut self, link_count: u32, link_density: f64) -> Self {
        self.link_count = link_count;
        self.link_density = link_density;
        self
    }

    pub(crate) fn role_is(&self, candidates: &[&str]) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| candidates.iter().any(|c| r.eq_ignore_ascii_case(c)))
    }

    pub(crate) fn tag_is(&self, candidates: &[&str]) -> bool {
        candidates.iter().any(|c| self.tag.eq_ignore_ascii_case(c))
    }
}

/// A comment in a threaded discussion.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ObservedComment {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Display age as shown on the page ("3 hours ago").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    /// Reply depth; 0 for top-level comments.
    pub depth: u32,
}

impl ObservedComment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn by(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// A heading or landmark from the page outline.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OutlineEntry {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub level: u8,
    pub text: String,
}

/// Structured snapshot of one page.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Observation {
    pub url: String,
    pub title: String,
    /// Visible page text as flattened by the extractor.
    pub text: String,
    pub items: Vec<ObservedItem>,
    pub blocks: Vec<ObservedBlock>,
    /// The extractor's best guess at the main content block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<ObservedBlock>,
    pub comments: Vec<ObservedComment>,
    pub outline: Vec<OutlineEntry>,
    /// Pre-computed access-limitation hints ("dialog", "auth_fields", ...).
    pub signals: Vec<String>,
}

impl Observation {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub(crate) fn has_signal(&self, needles: &[&str]) -> bool {
        self.signals.iter().any(|s| {
            let lower = s.to_lowercase();
            needles.iter().any(|n| lower.contains(n))
        })
    }
}

/// What the user asked for.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Intent {
    PageSummary,
    ItemSummary,
    CommentSummary,
    Action,
    #[default]
    Unknown,
}

/// The intent classifier's plan for one request.
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GoalPlan {
    /// The user's question, verbatim.
    pub goal: String,
    pub intent: Intent,
    /// 1-based index of the targeted list item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_index: Option<usize>,
    /// Substring of the targeted item's title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_query: Option<String>,
    pub wants_comments: bool,
}

impl GoalPlan {
    pub fn new(goal: impl Into<String>, intent: Intent) -> Self {
        Self {
            goal: goal.into(),
            intent,
            ..Default::default()
        }
    }

    pub fn with_item_index(mut self, index: usize) -> Self {
        self.item_index = Some(index);
        self
    }

    pub fn with_item_query(mut self, query: impl Into<String>) -> Self {
        self.item_query = Some(query.into());
        self
    }

    /// Comment summary requested either by intent or by explicit flag.
    pub fn wants_comments(&self) -> bool {
        self.wants_comments || self.intent == Intent::CommentSummary
    }
}
