//! Deterministic answers built only from extracted content.
//!
//! Used whenever model output fails validation. Nothing here calls the
//! model, and every sentence comes from the digest as first extracted
//! (`SummaryInput::source_text`) or from the structured list/comment entries.

use crate::NOT_STATED;
use crate::observation::{GoalPlan, Intent};
use crate::select::{CommentEntry, ListEntry, SummaryInput, SummaryKind, content_lines, metadata_value};
use crate::text::{is_low_signal_text, is_ui_heavy, normalize_for_match, split_sentences};
use std::collections::HashSet;

/// Appended to answers for access-limited pages.
pub const LIMITED_VISIBILITY_NOTE: &str = "Note: Only limited, partial content was visible on this page.";

const MAX_FALLBACK_ITEMS: usize = 10;
const PAGE_SENTENCES: usize = 4;
const ITEM_KEY_DETAILS: usize = 3;
const THEME_COMMENTS: usize = 3;
const MAX_CONTRIBUTORS: usize = 4;
const MAX_QUESTIONS: usize = 2;

/// Add the limited-visibility caveat unless the answer already carries one.
pub fn limited_visibility_note(answer: &str) -> String {
    let lower = answer.to_lowercase();
    if lower.contains("limited") || lower.contains("partial content") {
        return answer.to_string();
    }
    if answer.trim().is_empty() {
        return LIMITED_VISIBILITY_NOTE.to_string();
    }
    format!("{}\n\n{LIMITED_VISIBILITY_NOTE}", answer.trim_end())
}

/// Build an answer from the selected content alone.
pub fn synthesize_fallback(input: &SummaryInput, plan: &GoalPlan) -> String {
    let body = match input.kind() {
        SummaryKind::List => list_fallback(&input.list_entries, input.used_items),
        SummaryKind::Comments => comments_fallback(&input.comment_entries),
        SummaryKind::Item => item_fallback(input),
        SummaryKind::PageText if plan.intent == Intent::ItemSummary => item_fallback(input),
        SummaryKind::PageText => page_text_fallback(&input.source_text),
    };
    let body = body.unwrap_or_else(|| NOT_STATED.to_string());
    if input.access_limited {
        limited_visibility_note(&body)
    } else {
        body
    }
}

/// `text` with a terminal period, unless it already ends a sentence.
fn as_sentence(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.ends_with(['.', '!', '?', '\u{2026}']) {
        trimmed.to_string()
    } else {
        format!("{trimmed}.")
    }
}

/// Non-trivial sentences in order, deduplicated.
fn meaningful_sentences<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .flat_map(split_sentences)
        .filter(|s| !is_low_signal_text(s) && !is_ui_heavy(s))
        .filter(|s| seen.insert(normalize_for_match(s)))
        .collect()
}

fn list_fallback(entries: &[ListEntry], used_items: usize) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let shown = entries.len().min(MAX_FALLBACK_ITEMS);
    let mut lines = vec![if used_items > shown {
        format!("The page lists {used_items} items; the first {shown} are below.")
    } else if shown == 1 {
        "The page lists 1 item.".to_string()
    } else {
        format!("The page lists {shown} items.")
    }];
    for (i, entry) in entries.iter().take(shown).enumerate() {
        let detail = entry.detail.as_deref().map_or_else(|| NOT_STATED.to_string(), as_sentence);
        lines.push(format!("{}. {} {detail}", i + 1, as_sentence(&entry.title)));
    }
    Some(lines.join("\n"))
}

fn first_sentence(text: &str) -> Option<String> {
    split_sentences(text).into_iter().next()
}

fn comments_fallback(entries: &[CommentEntry]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }

    let themes: Vec<String> = entries
        .iter()
        .filter(|c| !is_low_signal_text(&c.body))
        .filter_map(|c| first_sentence(&c.body))
        .take(THEME_COMMENTS)
        .map(|s| format!("- {s}"))
        .collect();

    let mut contributors: Vec<(&str, usize)> = Vec::new();
    for author in entries.iter().filter_map(|c| c.author.as_deref()) {
        match contributors.iter_mut().find(|(a, _)| *a == author) {
            Some((_, n)) => *n += 1,
            None => contributors.push((author, 1)),
        }
    }
    contributors.sort_by(|a, b| b.1.cmp(&a.1));
    let contributors: Vec<String> = contributors
        .iter()
        .take(MAX_CONTRIBUTORS)
        .map(|(author, n)| {
            if *n == 1 {
                format!("- {author} (1 comment)")
            } else {
                format!("- {author} ({n} comments)")
            }
        })
        .collect();

    let questions: Vec<String> = entries
        .iter()
        .flat_map(|c| split_sentences(&c.body))
        .filter(|s| s.ends_with('?'))
        .take(MAX_QUESTIONS)
        .map(|s| format!("- {s}"))
        .collect();

    let reaction = entries
        .iter()
        .filter(|c| c.score.is_some())
        .max_by_key(|c| c.score.unwrap_or(i64::MIN))
        .and_then(|c| {
            let sentence = first_sentence(&c.body)?;
            let score = c.score.unwrap_or_default();
            Some(match &c.author {
                Some(author) => format!("- Highest-scored comment ({score} points) by {author}: {sentence}"),
                None => format!("- Highest-scored comment ({score} points): {sentence}"),
            })
        });

    let section = |heading: &str, lines: Vec<String>| {
        if lines.is_empty() {
            format!("{heading}: {NOT_STATED}")
        } else {
            format!("{heading}:\n{}", lines.join("\n"))
        }
    };
    Some(
        [
            section("Comment themes", themes),
            section("Notable contributors", contributors),
            section("Clarifications or Q&A", questions),
            section("Reactions", reaction.into_iter().collect()),
        ]
        .join("\n\n"),
    )
}

fn item_fallback(input: &SummaryInput) -> Option<String> {
    let title = input
        .item_title
        .clone()
        .or_else(|| (!input.title.is_empty()).then(|| input.title.clone()));

    let detail_lines = content_lines(&input.source_text).filter_map(|line| {
        if line.starts_with("Item:") {
            None
        } else {
            Some(
                line.strip_prefix("Details:")
                    .or_else(|| line.strip_prefix("Snippet:"))
                    .unwrap_or(line),
            )
        }
    });
    let sentences = meaningful_sentences(detail_lines);
    if title.is_none() && sentences.is_empty() {
        return None;
    }

    let overview = match (&title, sentences.first()) {
        (Some(title), Some(first)) => format!("{} {first}", as_sentence(title)),
        (Some(title), None) => as_sentence(title),
        (None, Some(first)) => first.clone(),
        (None, None) => NOT_STATED.to_string(),
    };
    let key_details: Vec<String> = sentences
        .iter()
        .skip(1)
        .take(ITEM_KEY_DETAILS)
        .map(|s| format!("- {s}"))
        .collect();
    let key_details = if key_details.is_empty() {
        format!(" {NOT_STATED}")
    } else {
        format!("\n{}", key_details.join("\n"))
    };
    Some(format!(
        "Overview: {overview}\n\nKey details:{key_details}\n\nWhy it matters: {NOT_STATED}"
    ))
}

fn page_text_fallback(source_text: &str) -> Option<String> {
    let sentences = meaningful_sentences(content_lines(source_text));
    if !sentences.is_empty() {
        return Some(
            sentences
                .into_iter()
                .take(PAGE_SENTENCES)
                .collect::<Vec<_>>()
                .join(" "),
        );
    }
    source_text
        .lines()
        .find_map(|l| match metadata_value(l.trim()) {
            Some(("Outline", value)) if !value.is_empty() => {
                Some(format!("The page is organized into these sections: {value}."))
            }
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, detail: Option<&str>) -> ListEntry {
        ListEntry {
            title: title.into(),
            detail: detail.map(Into::into),
            url: None,
        }
    }

    fn comment(body: &str, author: Option<&str>, score: Option<i64>) -> CommentEntry {
        CommentEntry {
            body: body.into(),
            author: author.map(Into::into),
            age: None,
            score,
            depth: 0,
        }
    }

    #[test]
    fn list_fallback_numbers_every_title() {
        let mut input = SummaryInput::new(SummaryKind::List, "digest");
        input.list_entries = vec![
            entry("Alpha Launch Event", None),
            entry("Beta Release Notes", Some("Version 2 ships today")),
            entry("Gamma Outage Report", None),
        ];
        input.used_items = 3;
        let answer = synthesize_fallback(&input, &GoalPlan::default());
        assert_eq!(
            answer,
            "The page lists 3 items.\n\
             1. Alpha Launch Event. Not stated in the page.\n\
             2. Beta Release Notes. Version 2 ships today.\n\
             3. Gamma Outage Report. Not stated in the page."
        );
    }

    #[test]
    fn list_fallback_caps_at_ten() {
        let mut input = SummaryInput::new(SummaryKind::List, "digest");
        input.list_entries = (1..=14).map(|i| entry(&format!("Story {i}"), None)).collect();
        input.used_items = 14;
        let answer = synthesize_fallback(&input, &GoalPlan::default());
        assert!(answer.starts_with("The page lists 14 items; the first 10 are below."));
        assert!(answer.contains("10. Story 10."));
        assert!(!answer.contains("11. "));
    }

    #[test]
    fn comment_fallback_sections() {
        let mut input = SummaryInput::new(SummaryKind::Comments, "digest");
        input.comment_entries = vec![
            comment("The upgrade broke our CI pipeline. We pinned the old version.", Some("ana"), Some(12)),
            comment("Did anyone try the new cache flag?", Some("bo"), Some(3)),
            comment("Pinning worked for our team as well.", Some("ana"), None),
        ];
        let answer = synthesize_fallback(&input, &GoalPlan::default());
        assert!(answer.contains("Comment themes:\n- The upgrade broke our CI pipeline."));
        assert!(answer.contains("- ana (2 comments)"));
        assert!(answer.contains("Clarifications or Q&A:\n- Did anyone try the new cache flag?"));
        assert!(answer.contains("Highest-scored comment (12 points) by ana"));
    }

    #[test]
    fn item_fallback_three_sections() {
        let mut input = SummaryInput::new(
            SummaryKind::Item,
            "Title: News\nItem: Beta Release Notes\nDetails: Version 2.1 adds offline sync. It also fixes a crash on Android tablets.",
        );
        input.item_title = Some("Beta Release Notes".into());
        let plan = GoalPlan::new("beta", Intent::ItemSummary);
        let answer = synthesize_fallback(&input, &plan);
        assert!(answer.starts_with("Overview: Beta Release Notes. Version 2.1 adds offline sync."));
        assert!(answer.contains("Key details:\n- It also fixes a crash on Android tablets."));
        assert!(answer.ends_with("Why it matters: Not stated in the page."));
    }

    #[test]
    fn page_text_uses_meaningful_sentences() {
        let input = SummaryInput::new(
            SummaryKind::PageText,
            "Title: Harbor\n\nSign in\nThe harbor reopened on Monday after repairs. Crews replaced two cables.",
        );
        assert_eq!(
            synthesize_fallback(&input, &GoalPlan::default()),
            "The harbor reopened on Monday after repairs. Crews replaced two cables."
        );
    }

    #[test]
    fn nothing_usable_is_not_stated_with_access_note() {
        let mut input = SummaryInput::new(SummaryKind::PageText, "Title: Login");
        assert_eq!(synthesize_fallback(&input, &GoalPlan::default()), NOT_STATED);
        input.access_limited = true;
        let answer = synthesize_fallback(&input, &GoalPlan::default());
        assert!(answer.starts_with(NOT_STATED));
        assert!(answer.contains("limited, partial content"));
    }

    #[test]
    fn note_is_not_duplicated() {
        let once = limited_visibility_note("Answer.");
        assert_eq!(limited_visibility_note(&once), once);
    }
}
