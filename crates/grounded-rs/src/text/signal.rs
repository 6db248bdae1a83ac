//! Low-signal, UI-chrome, and promotional text classification.
//!
//! Character classes used by the predicates:
//!
//! | Predicate | Rust classifier | Unicode property |
//! |-----------|-----------------|------------------|
//! | letter | `char::is_alphabetic` | `Alphabetic` |
//! | uppercase letter | `char::is_uppercase` | `Uppercase` |
//! | digit | `char::is_numeric` | General categories `Nd`, `Nl`, `No` |
//! | whitespace | `char::is_whitespace` | `White_Space` |
//!
//! The numeric thresholds are empirical and kept exactly as tuned.

use super::normalize::{contains_phrase, normalize_for_match};
use std::collections::HashSet;

/// Phrases that mark short navigation or account chrome.
const UI_CHROME_PHRASES: &[&str] = &[
    "sign in",
    "sign up",
    "log in",
    "login",
    "log out",
    "create account",
    "my account",
    "subscribe",
    "menu",
    "main menu",
    "skip to",
    "search",
    "home",
    "share",
    "share this",
    "follow us",
    "back to top",
    "read more",
    "load more",
    "show more",
    "see more",
    "next page",
    "previous page",
    "cookie",
    "cookies",
    "privacy policy",
    "terms of service",
    "terms of use",
    "contact us",
    "about us",
    "navigation",
    "toggle navigation",
    "close",
    "open in app",
    "download the app",
    "hide",
    "reply",
    "permalink",
    "upvote",
    "downvote",
    "flag",
];

/// Phrases that mark chrome regardless of length.
const STRONG_CHROME_PHRASES: &[&str] = &[
    "we use cookies",
    "accept all cookies",
    "accept cookies",
    "cookie settings",
    "cookie preferences",
    "skip to main content",
    "skip to content",
    "all rights reserved",
    "by continuing to use",
    "enable javascript",
    "javascript is disabled",
    "your browser does not support",
];

/// Phrases that mark advertising or upsell copy.
const PROMOTIONAL_PHRASES: &[&str] = &[
    "sponsored",
    "advertisement",
    "promoted",
    "buy now",
    "shop now",
    "order now",
    "limited time",
    "free trial",
    "start your free trial",
    "promo code",
    "discount code",
    "save up to",
    "sign up for our newsletter",
    "subscribe to our newsletter",
    "get the app",
    "upgrade to premium",
    "unlock full access",
];

/// Short text limit for [`UI_CHROME_PHRASES`].
const SHORT_CHROME_CHARS: usize = 80;

/// Upper length for [`STRONG_CHROME_PHRASES`] and promotional matches.
const LONG_CHROME_CHARS: usize = 300;

/// Character and word statistics for one piece of text.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TextStats {
    pub chars: usize,
    pub words: usize,
    pub unique_words: usize,
    pub short_words: usize,
    pub capitalized_words: usize,
    pub letters: usize,
    pub uppercase: usize,
    pub digits: usize,
    pub non_space: usize,
}

impl TextStats {
    pub fn of(text: &str) -> Self {
        let mut stats = TextStats::default();
        let mut unique: HashSet<String> = HashSet::new();

        for c in text.chars() {
            stats.chars += 1;
            if c.is_whitespace() {
                continue;
            }
            stats.non_space += 1;
            if c.is_alphabetic() {
                stats.letters += 1;
                if c.is_uppercase() {
                    stats.uppercase += 1;
                }
            } else if c.is_numeric() {
                stats.digits += 1;
            }
        }

        for word in text.split_whitespace() {
            stats.words += 1;
            let core = word.trim_matches(|c: char| !c.is_alphanumeric());
            if core.chars().count() <= 2 {
                stats.short_words += 1;
            }
            if core.chars().next().is_some_and(char::is_uppercase) {
                stats.capitalized_words += 1;
            }
            unique.insert(core.to_lowercase());
        }
        stats.unique_words = unique.len();
        stats
    }

    pub fn unique_ratio(&self) -> f64 {
        ratio(self.unique_words, self.words)
    }

    pub fn uppercase_ratio(&self) -> f64 {
        ratio(self.uppercase, self.letters)
    }

    pub fn digit_ratio(&self) -> f64 {
        ratio(self.digits, self.non_space)
    }

    pub fn short_word_ratio(&self) -> f64 {
        ratio(self.short_words, self.words)
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Whether text is labels, boilerplate, or data noise rather than prose.
///
/// True when any of:
/// - fewer than 6 words and under 120 characters, unless it has a digit, a
///   capitalized word, or a colon;
/// - at least 12 words with a unique-word ratio under 0.4;
/// - fewer than 60 words and (uppercase-letter ratio over 0.6, digit ratio
///   over 0.45, or ratio of words of at most 2 characters over 0.45).
pub fn is_low_signal_text(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    let stats = TextStats::of(trimmed);

    if stats.words < 6
        && stats.chars < 120
        && !(stats.digits > 0 || stats.capitalized_words > 0 || trimmed.contains(':'))
    {
        return true;
    }
    if stats.words >= 12 && stats.unique_ratio() < 0.4 {
        return true;
    }
    stats.words < 60
        && (stats.uppercase_ratio() > 0.6
            || stats.digit_ratio() > 0.45
            || stats.short_word_ratio() > 0.45)
}

/// Whether text is navigation, account, or consent chrome.
pub fn is_ui_chrome(text: &str) -> bool {
    let trimmed = text.trim();
    let chars = trimmed.chars().count();
    if chars == 0 {
        return false;
    }
    let norm = normalize_for_match(trimmed);

    if chars <= LONG_CHROME_CHARS
        && STRONG_CHROME_PHRASES
            .iter()
            .any(|p| contains_phrase(&norm, p))
    {
        return true;
    }
    if chars <= SHORT_CHROME_CHARS && UI_CHROME_PHRASES.iter().any(|p| contains_phrase(&norm, p)) {
        return true;
    }
    // "Home | News | Sports" style link rows.
    let separators = trimmed
        .chars()
        .filter(|c| matches!(c, '|' | '\u{00B7}' | '\u{2022}' | '\u{203A}' | '\u{00BB}'))
        .count();
    chars < 120 && separators >= 3
}

/// Whether text is advertising or upsell copy.
pub fn is_promotional(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() > LONG_CHROME_CHARS {
        return false;
    }
    let norm = normalize_for_match(trimmed);
    PROMOTIONAL_PHRASES.iter().any(|p| contains_phrase(&norm, p))
}

/// Chrome or promotional text.
pub fn is_ui_heavy(text: &str) -> bool {
    is_ui_chrome(text) || is_promotional(text)
}
