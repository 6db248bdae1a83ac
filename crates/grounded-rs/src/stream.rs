//! Displayed-text deltas and the in-stream replacement marker.
//!
//! A model may emit [`REPLACEMENT_MARKER`] to retract everything it has
//! written so far; text after the marker starts the answer over.
//! [`ReplacementBuffer`] turns raw model deltas into [`SummaryDelta`]s for
//! display. A marker split across deltas is still recognized, and marker
//! fragments are never shown: a trailing partial marker is held back until
//! the next delta resolves it.
//!
//! Pending state lives only in the buffer. Dropping the buffer (as a
//! cancelled stream does) discards it without applying anything.

use serde::Serialize;

/// Retracts all output that precedes it.
pub const REPLACEMENT_MARKER: &str = "<<<REPLACE>>>";

/// A change to the displayed answer.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", content = "text", rename_all = "camelCase")]
pub enum SummaryDelta {
    /// Append to the displayed text.
    Text(String),
    /// Replace the displayed text entirely.
    Replace(String),
}

/// Fold deltas into the text a caller would display.
pub fn apply_deltas<'a>(deltas: impl IntoIterator<Item = &'a SummaryDelta>) -> String {
    let mut text = String::new();
    for delta in deltas {
        match delta {
            SummaryDelta::Text(t) => text.push_str(t),
            SummaryDelta::Replace(t) => {
                text.clear();
                text.push_str(t);
            }
        }
    }
    text
}

/// Everything after the last replacement marker.
pub fn resolve_replacements(text: &str) -> &str {
    text.rsplit_once(REPLACEMENT_MARKER)
        .map_or(text, |(_, after)| after)
}

/// Incremental marker resolution for streamed output.
#[derive(Debug, Default)]
pub struct ReplacementBuffer {
    shown: String,
    pending: String,
}

impl ReplacementBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw delta; returns the display deltas it produces.
    pub fn push(&mut self, delta: &str) -> Vec<SummaryDelta> {
        let mut out = Vec::new();
        self.pending.push_str(delta);

        while let Some(idx) = self.pending.find(REPLACEMENT_MARKER) {
            let rest = self.pending.split_off(idx + REPLACEMENT_MARKER.len());
            self.pending = rest;
            self.shown.clear();
            out.push(SummaryDelta::Replace(String::new()));
        }

        let hold = partial_marker_suffix(&self.pending);
        let held = self.pending.split_off(self.pending.len() - hold);
        let ready = std::mem::replace(&mut self.pending, held);
        if !ready.is_empty() {
            self.shown.push_str(&ready);
            out.push(SummaryDelta::Text(ready));
        }
        out
    }

    /// End of stream: a held-back partial marker was literal text after all.
    pub fn flush(&mut self) -> Option<SummaryDelta> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        self.shown.push_str(&rest);
        Some(SummaryDelta::Text(rest))
    }

    /// Text displayed so far (held-back bytes excluded).
    pub fn text(&self) -> &str {
        &self.shown
    }
}

/// Length of the longest proper marker prefix that `text` ends with.
fn partial_marker_suffix(text: &str) -> usize {
    (1..REPLACEMENT_MARKER.len())
        .rev()
        .find(|&k| {
            REPLACEMENT_MARKER
                .get(..k)
                .is_some_and(|prefix| text.ends_with(prefix))
        })
        .unwrap_or(0)
}
