//! Whitespace normalization, sentence splitting, and repetition collapsing.
//!
//! Every function here is pure. Whitespace follows the Unicode `White_Space`
//! property (`char::is_whitespace` / `str::split_whitespace`), so non-breaking
//! spaces and ideographic spaces collapse like ASCII spaces.

/// Maximum indentation kept in front of a `- ` list line.
const MAX_LIST_INDENT: usize = 8;

/// Smallest token window [`collapse_repeated_tokens`] looks for.
const MIN_REPEAT_WINDOW: usize = 4;

/// Largest token window [`collapse_repeated_tokens`] looks for.
const MAX_REPEAT_WINDOW: usize = 24;

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize whitespace line by line, keeping line structure.
///
/// Each line is collapsed like [`normalize_whitespace`]. Lines that are
/// `- ` list entries keep their indentation, rounded up to the next 2-space
/// unit and capped at 8 columns (a tab counts as two columns). Runs of blank
/// lines shrink to one, and leading/trailing blank lines are dropped.
pub fn normalize_preserving_newlines(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let body = normalize_whitespace(raw);
        if body.is_empty() {
            if lines.last().is_some_and(|l| !l.is_empty()) {
                lines.push(String::new());
            }
            continue;
        }
        let indent = leading_columns(raw);
        if indent > 0 && body.starts_with("- ") {
            let rounded = (indent.div_ceil(2) * 2).min(MAX_LIST_INDENT);
            lines.push(format!("{}{body}", " ".repeat(rounded)));
        } else {
            lines.push(body);
        }
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn leading_columns(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 2 } else { 1 })
        .sum()
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\u{2026}' | '\u{3002}' | '\u{FF01}' | '\u{FF1F}')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '}' | '\u{201D}' | '\u{2019}')
}

/// Split text into sentences.
///
/// A sentence ends at terminal punctuation (`.`, `!`, `?`, ellipsis, and the
/// full-width forms) followed by whitespace or end of input, or at a newline.
/// Terminal punctuation nested inside `()`, `[]`, `{}` or double quotes does
/// not end a sentence. Trailing closers (`)`, `"`, `’`) stay with the sentence
/// they close. Returned sentences are whitespace-normalized and non-empty.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;
    let mut in_quote = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            flush_sentence(&mut current, &mut sentences);
            depth = 0;
            in_quote = false;
            continue;
        }
        current.push(c);
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '"' => in_quote = !in_quote,
            '\u{201C}' => in_quote = true,
            '\u{201D}' => in_quote = false,
            _ if is_terminal(c) && depth == 0 && !in_quote => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' || !(is_terminal(next) || is_closer(next)) {
                        break;
                    }
                    current.push(next);
                    chars.next();
                }
                if chars.peek().is_none_or(|n| n.is_whitespace()) {
                    flush_sentence(&mut current, &mut sentences);
                }
            }
            _ => {}
        }
    }
    flush_sentence(&mut current, &mut sentences);
    sentences
}

fn flush_sentence(current: &mut String, sentences: &mut Vec<String>) {
    let sentence = normalize_whitespace(current);
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
    current.clear();
}

/// Remove immediately repeated token windows.
///
/// At each position, windows of 24 tokens down to 4 are tried; when
/// `tokens[i..i+w] == tokens[i+w..i+2w]` the second copy is dropped and the
/// scan resumes after it. A third copy is therefore kept; it is only removed
/// if it is itself followed by a fourth. The result is whitespace-normalized.
pub fn collapse_repeated_tokens(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut out: Vec<&str> = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let mut matched = false;
        for window in (MIN_REPEAT_WINDOW..=MAX_REPEAT_WINDOW).rev() {
            if i + 2 * window > tokens.len() {
                continue;
            }
            let head = &tokens[i..i + window];
            if head == &tokens[i + window..i + 2 * window] {
                out.extend_from_slice(head);
                i += 2 * window;
                matched = true;
                break;
            }
        }
        if !matched {
            out.push(tokens[i]);
            i += 1;
        }
    }
    out.join(" ")
}

/// Lowercase, replace every non-alphanumeric character with a space, and
/// collapse whitespace. Used wherever two texts are compared for grounding.
pub fn normalize_for_match(text: &str) -> String {
    let mapped: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    normalize_whitespace(&mapped)
}

/// Normalized tokens of at least four characters.
pub fn content_tokens(text: &str) -> Vec<String> {
    normalize_for_match(text)
        .split(' ')
        .filter(|t| t.chars().count() >= 4)
        .map(str::to_string)
        .collect()
}

/// Whether `needle` occurs in `haystack` on token boundaries. Both sides are
/// expected to be [`normalize_for_match`] output.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    format!(" {haystack} ").contains(&format!(" {needle} "))
}

/// Truncate to at most `max` characters, ending with `...` when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut cut: String = text.chars().take(keep).collect();
    if let Some(space) = cut.rfind(' ')
        && space > keep / 2
    {
        cut.truncate(space);
    }
    format!("{}...", cut.trim_end())
}
