//! Generation profile: output format, token budget, and sampling per request.

use crate::observation::{GoalPlan, Intent};
use crate::select::{SummaryInput, SummaryKind};
use serde::Serialize;

/// Lower bound on any generation budget.
pub const MIN_MAX_TOKENS: u32 = 160;
/// Upper bound on any generation budget.
pub const MAX_MAX_TOKENS: u32 = 2000;

/// Top-p used whenever the plan targets a single item.
const ITEM_INTENT_TOP_P: f32 = 0.7;

/// Shape the answer is asked to take.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OutputFormat {
    /// Paragraphs, or a numbered list for list digests.
    Plain,
    /// Themed sections with per-comment citations.
    CommentDetail,
}

/// Everything that varies the model call for one request.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationProfile {
    pub format: OutputFormat,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Numbered lines the answer should contain (list digests).
    pub list_target_items: usize,
    /// Comments the answer should cite (comment digests).
    pub comment_citations: usize,
}

impl GenerationProfile {
    /// Build the profile for a selected input.
    ///
    /// `requested_max_tokens` overrides the per-kind base budget; either way
    /// the result is clamped to [`MIN_MAX_TOKENS`]..=[`MAX_MAX_TOKENS`].
    pub fn for_input(
        input: &SummaryInput,
        plan: &GoalPlan,
        requested_max_tokens: Option<u32>,
    ) -> Self {
        let kind = input.kind();
        let format = if plan.wants_comments() {
            OutputFormat::CommentDetail
        } else {
            OutputFormat::Plain
        };
        let max_tokens = requested_max_tokens
            .unwrap_or_else(|| base_max_tokens(kind))
            .clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS);
        let (temperature, mut top_p) = sampling(kind);
        if plan.intent == Intent::ItemSummary {
            top_p = ITEM_INTENT_TOP_P;
        }
        Self {
            format,
            max_tokens,
            temperature,
            top_p,
            list_target_items: list_target_items(input.used_items),
            comment_citations: comment_citations(input.used_comments),
        }
    }
}

fn base_max_tokens(kind: SummaryKind) -> u32 {
    match kind {
        SummaryKind::List => 1200,
        SummaryKind::Item => 1400,
        SummaryKind::Comments => 1400,
        SummaryKind::PageText => 1000,
    }
}

/// `(temperature, top_p)` per input kind.
fn sampling(kind: SummaryKind) -> (f32, f32) {
    match kind {
        SummaryKind::List => (0.6, 0.8),
        SummaryKind::Comments => (0.3, 0.6),
        SummaryKind::Item => (0.35, 0.7),
        SummaryKind::PageText => (0.5, 0.75),
    }
}

fn list_target_items(used_items: usize) -> usize {
    if used_items == 0 {
        return 5;
    }
    used_items.max(7).clamp(7, 10).min(used_items)
}

fn comment_citations(used_comments: usize) -> usize {
    match used_comments {
        0 => 0,
        1 => 1,
        n => n.clamp(2, 4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(kind: SummaryKind, items: usize, comments: usize) -> SummaryInput {
        let mut input = SummaryInput::new(kind, "digest");
        input.used_items = items;
        input.used_comments = comments;
        input
    }

    #[test]
    fn budgets_per_kind_and_clamping() {
        let plan = GoalPlan::default();
        let p = GenerationProfile::for_input(&input(SummaryKind::List, 3, 0), &plan, None);
        assert_eq!(p.max_tokens, 1200);
        let p = GenerationProfile::for_input(&input(SummaryKind::PageText, 0, 0), &plan, None);
        assert_eq!(p.max_tokens, 1000);
        let p = GenerationProfile::for_input(&input(SummaryKind::PageText, 0, 0), &plan, Some(50));
        assert_eq!(p.max_tokens, MIN_MAX_TOKENS);
        let p = GenerationProfile::for_input(&input(SummaryKind::Item, 0, 0), &plan, Some(9000));
        assert_eq!(p.max_tokens, MAX_MAX_TOKENS);
    }

    #[test]
    fn list_targets() {
        assert_eq!(list_target_items(0), 5);
        assert_eq!(list_target_items(3), 3);
        assert_eq!(list_target_items(8), 8);
        assert_eq!(list_target_items(24), 10);
    }

    #[test]
    fn citation_targets() {
        assert_eq!(comment_citations(0), 0);
        assert_eq!(comment_citations(1), 1);
        assert_eq!(comment_citations(2), 2);
        assert_eq!(comment_citations(30), 4);
    }

    #[test]
    fn sampling_follows_kind_and_item_intent() {
        let plan = GoalPlan::default();
        let p = GenerationProfile::for_input(&input(SummaryKind::Comments, 0, 3), &plan, None);
        assert_eq!((p.temperature, p.top_p), (0.3, 0.6));
        assert_eq!(p.format, OutputFormat::Plain);

        let plan = GoalPlan::new("summarize item", Intent::ItemSummary);
        let p = GenerationProfile::for_input(&input(SummaryKind::List, 5, 0), &plan, None);
        assert_eq!((p.temperature, p.top_p), (0.6, 0.7));

        let plan = GoalPlan::new("comments", Intent::CommentSummary);
        let p = GenerationProfile::for_input(&input(SummaryKind::Comments, 0, 3), &plan, None);
        assert_eq!(p.format, OutputFormat::CommentDetail);
        assert_eq!(p.comment_citations, 3);
    }
}
