//! Which blocks count as page content.

use crate::observation::{ObservedBlock, Observation};
use crate::text::is_low_signal_text;

const EXCLUDED_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "menu", "form", "address", "button", "input", "label",
    "dialog",
];

const EXCLUDED_ROLES: &[&str] = &[
    "navigation",
    "banner",
    "contentinfo",
    "menu",
    "dialog",
    "alertdialog",
];

/// Whether the page is shaped like a feed, result list, or index.
///
/// True when there are at least 12 items, or at least 6 items and a primary
/// block under 500 characters, or at least 3 items and a primary block under
/// 200 characters. A missing primary block counts as zero characters.
pub fn looks_like_list(observation: &Observation) -> bool {
    let items = observation.items.len();
    let primary = primary_chars(observation);
    items >= 12 || (items >= 6 && primary < 500) || (items >= 3 && primary < 200)
}

pub(crate) fn primary_chars(observation: &Observation) -> usize {
    observation
        .primary
        .as_ref()
        .map_or(0, |p| p.text.trim().chars().count())
}

fn is_structural_chrome(block: &ObservedBlock) -> bool {
    block.tag_is(EXCLUDED_TAGS) || block.role_is(EXCLUDED_ROLES)
}

/// Link-heavy blocks are navigation lists even without a nav tag.
fn is_link_heavy(block: &ObservedBlock) -> bool {
    let (density, links) = (block.link_density, block.link_count);
    (density >= 0.6 && links >= 6) || (density >= 0.4 && links >= 10) || (links >= 40 && density >= 0.15)
}

/// Block passes the structural and link filters; its text is not judged yet.
pub(crate) fn is_candidate_block(block: &ObservedBlock) -> bool {
    !is_structural_chrome(block) && !is_link_heavy(block)
}

/// Relevance filter for ordinary blocks.
pub fn is_relevant_block(block: &ObservedBlock) -> bool {
    is_candidate_block(block) && !is_low_signal_text(&block.text)
}

/// Relevance filter for the extractor's primary block.
///
/// The extractor already scored this block as main content, so only a much
/// denser link profile (>= 0.7 with at least 12 links) excludes it.
pub fn is_relevant_primary(block: &ObservedBlock) -> bool {
    if is_structural_chrome(block) {
        return false;
    }
    if block.link_density >= 0.7 && block.link_count >= 12 {
        return false;
    }
    !is_low_signal_text(&block.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservedItem;

    const PROSE: &str = "The committee approved the new budget after a long debate about \
                         transit funding and school repairs across the district.";

    fn with_items(n: usize, primary: Option<&str>) -> Observation {
        let mut obs = Observation::new("https://example.com", "Example");
        obs.items = (0..n).map(|i| ObservedItem::new(format!("Item {i}"))).collect();
        obs.primary = primary.map(|t| ObservedBlock::new("main", t));
        obs
    }

    #[test]
    fn list_rule_thresholds() {
        assert!(looks_like_list(&with_items(12, Some(&"x".repeat(5000)))));
        assert!(looks_like_list(&with_items(6, Some(&"x".repeat(499)))));
        assert!(!looks_like_list(&with_items(6, Some(&"x".repeat(500)))));
        assert!(looks_like_list(&with_items(3, None)));
        assert!(!looks_like_list(&with_items(3, Some(&"x".repeat(200)))));
        assert!(!looks_like_list(&with_items(2, None)));
    }

    #[test]
    fn chrome_tags_and_roles_are_excluded() {
        assert!(is_relevant_block(&ObservedBlock::new("p", PROSE)));
        assert!(!is_relevant_block(&ObservedBlock::new("footer", PROSE)));
        assert!(!is_relevant_block(&ObservedBlock::new("div", PROSE).with_role("banner")));
        assert!(!is_relevant_primary(&ObservedBlock::new("DIALOG", PROSE)));
    }

    #[test]
    fn link_density_rules() {
        let block = |links, density| ObservedBlock::new("div", PROSE).with_links(links, density);
        assert!(!is_relevant_block(&block(6, 0.6)));
        assert!(is_relevant_block(&block(5, 0.6)));
        assert!(!is_relevant_block(&block(10, 0.4)));
        assert!(!is_relevant_block(&block(40, 0.15)));
        assert!(is_relevant_block(&block(39, 0.15)));
    }

    #[test]
    fn primary_tolerates_denser_links_than_blocks() {
        let block = ObservedBlock::new("article", PROSE).with_links(10, 0.65);
        assert!(!is_relevant_block(&block));
        assert!(is_relevant_primary(&block));
        let dense = ObservedBlock::new("article", PROSE).with_links(12, 0.7);
        assert!(!is_relevant_primary(&dense));
    }
}
