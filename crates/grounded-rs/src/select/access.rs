//! Access-limited page detection (login walls, consent overlays, near-empty pages).

use super::SummaryInput;
use super::relevance::{is_relevant_block, primary_chars};
use crate::observation::Observation;
use tracing::debug;

pub const ACCESS_OVERLAY_OR_DIALOG: &str = "overlay_or_dialog";
pub const ACCESS_AUTH_FIELDS: &str = "auth_fields";
pub const ACCESS_LOW_VISIBLE_TEXT: &str = "low_visible_text";

const SMALL_PRIMARY_CHARS: usize = 220;
const SMALL_BLOCK_CHARS: usize = 900;
const SMALL_TOTAL_CHARS: usize = 1800;
const LOW_VISIBLE_CHARS: usize = 120;

#[derive(Debug, Default, PartialEq)]
struct VisibleContent {
    primary: usize,
    blocks: usize,
    total: usize,
}

impl VisibleContent {
    fn measure(observation: &Observation) -> Self {
        let primary = primary_chars(observation);
        let blocks = observation
            .blocks
            .iter()
            .filter(|b| is_relevant_block(b))
            .map(|b| b.text.trim().chars().count())
            .sum();
        let text = observation.text.trim().chars().count();
        let total = if text > 0 { text } else { primary + blocks };
        Self {
            primary,
            blocks,
            total,
        }
    }

    fn is_small(&self) -> bool {
        self.primary < SMALL_PRIMARY_CHARS
            && self.blocks < SMALL_BLOCK_CHARS
            && self.total < SMALL_TOTAL_CHARS
    }
}

fn has_dialog(observation: &Observation) -> bool {
    observation
        .blocks
        .iter()
        .any(|b| b.tag_is(&["dialog"]) || b.role_is(&["dialog", "alertdialog", "alert"]))
        || observation.has_signal(&["dialog", "overlay", "modal"])
}

fn has_auth_fields(observation: &Observation) -> bool {
    observation.blocks.iter().any(|b| {
        b.tag_is(&["input", "form", "label"]) && {
            let lower = b.text.to_lowercase();
            lower.contains("password") || lower.contains("email")
        }
    }) || observation.has_signal(&["auth", "password", "login", "email"])
}

/// Reason tags for an access-limited page, empty when content looks complete.
pub(crate) fn access_reasons(observation: &Observation) -> Vec<&'static str> {
    let visible = VisibleContent::measure(observation);
    if !visible.is_small() {
        return Vec::new();
    }
    let mut reasons = Vec::new();
    if has_dialog(observation) {
        reasons.push(ACCESS_OVERLAY_OR_DIALOG);
    }
    if has_auth_fields(observation) {
        reasons.push(ACCESS_AUTH_FIELDS);
    }
    if visible.total < LOW_VISIBLE_CHARS {
        reasons.push(ACCESS_LOW_VISIBLE_TEXT);
    }
    reasons
}

pub(crate) fn apply_access_limits(observation: &Observation, input: &mut SummaryInput) {
    let reasons = access_reasons(observation);
    if reasons.is_empty() {
        return;
    }
    debug!(reasons = ?reasons, "Page content looks access-limited");
    input.access_limited = true;
    for reason in reasons {
        if !input.has_signal(reason) {
            input.access_signals.push(reason.to_string());
        }
    }
}
