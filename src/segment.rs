//! Incremental text segmentation.
//!
//! The producer emits tokens, not sentences. The [`Segmenter`] groups a
//! stream of text fragments into presentable units (paragraphs or list
//! items) without waiting for the whole answer, so the UI can render
//! completed thoughts progressively instead of one growing blob.
//!
//! A boundary is one of:
//! - a newline present in the accumulated content;
//! - the bullet marker (`- ` by default) starting after the first byte;
//! - a numbered-label pattern (`<digits> <word> :`) starting after the
//!   first byte.
//!
//! The bullet marker and the label rule are configurable; the defaults are
//! heuristics known to be fragile against arbitrary model output, so a
//! mismatch should be fixed in configuration, not by widening the patterns
//! here.

use crate::config::StreamConfig;

/// A finished, presentable chunk of answer text.
///
/// Bulleted units carry `bullet: true` with the marker already stripped
/// from `text`; re-adding list styling is the renderer's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayUnit {
    pub text: String,
    pub bullet: bool,
}

impl DisplayUnit {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bullet: false,
        }
    }

    pub fn bullet(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bullet: true,
        }
    }
}

/// Accumulates text-frame content and emits display units at boundaries.
///
/// Invariant: between calls the accumulator holds only an unterminated
/// trailing fragment — everything before a boundary has already been
/// moved out.
#[derive(Debug)]
pub struct Segmenter {
    bullet_marker: String,
    label_boundaries: bool,
    accumulator: String,
}

impl Segmenter {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            bullet_marker: config.bullet_marker.clone(),
            label_boundaries: config.label_boundaries,
            accumulator: String::new(),
        }
    }

    /// Append one text fragment and return any units it completes.
    ///
    /// The fragment is appended verbatim; the final units depend only on
    /// the total content delivered, not on how it was chunked.
    pub fn push(&mut self, content: &str) -> Vec<DisplayUnit> {
        self.accumulator.push_str(content);

        let mut units = Vec::new();
        while let Some((at, skip)) = self.find_boundary() {
            let head: String = self.accumulator.drain(..at + skip).collect();
            if let Some(unit) = self.make_unit(&head[..at]) {
                units.push(unit);
            }
        }
        units
    }

    /// Flush the trailing fragment as a final unit at stream end.
    pub fn flush(&mut self) -> Option<DisplayUnit> {
        let rest = std::mem::take(&mut self.accumulator);
        self.make_unit(&rest)
    }

    /// Find the earliest boundary: `(byte index, bytes consumed by the
    /// boundary itself)`. A newline is consumed; bullet and label
    /// boundaries are look-ahead only, so the matched text starts the
    /// next unit.
    fn find_boundary(&self) -> Option<(usize, usize)> {
        let s = &self.accumulator;
        let bytes = s.as_bytes();

        for i in 0..bytes.len() {
            if bytes[i] == b'\n' {
                return Some((i, 1));
            }
            if i == 0 || !s.is_char_boundary(i) {
                continue;
            }
            if s[i..].starts_with(&self.bullet_marker) {
                return Some((i, 0));
            }
            // Avoid splitting inside a number: the label must not be the
            // continuation of digits already seen.
            if self.label_boundaries
                && !bytes[i - 1].is_ascii_digit()
                && starts_with_label(&s[i..])
            {
                return Some((i, 0));
            }
        }
        None
    }

    fn make_unit(&self, raw: &str) -> Option<DisplayUnit> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Some(rest) = trimmed.strip_prefix(&self.bullet_marker) {
            let text = rest.trim();
            if text.is_empty() {
                return None;
            }
            return Some(DisplayUnit::bullet(text));
        }
        Some(DisplayUnit::paragraph(trimmed))
    }
}

/// Does `s` start with `<digits> <word> :` (optional spaces before the
/// colon)?
fn starts_with_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == 0 || i >= bytes.len() || bytes[i] != b' ' {
        return false;
    }
    i += 1;
    let word_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    if i == word_start {
        return false;
    }
    while i < bytes.len() && bytes[i] == b' ' {
        i += 1;
    }
    i < bytes.len() && bytes[i] == b':'
}
