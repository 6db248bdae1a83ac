//! Text normalization and signal classification.
//!
//! - [`normalize`]: whitespace and line normalization, sentence splitting,
//!   repeated-token collapsing, and the match normalization shared by the
//!   grounding checks.
//! - [`signal`]: low-signal, UI-chrome, and promotional text detection.

pub mod normalize;
pub mod signal;

pub use normalize::{
    collapse_repeated_tokens, content_tokens, normalize_for_match, normalize_preserving_newlines,
    normalize_whitespace, split_sentences, truncate_chars,
};
pub use signal::{TextStats, is_low_signal_text, is_promotional, is_ui_chrome, is_ui_heavy};
