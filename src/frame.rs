//! Frame classification.
//!
//! Maps each complete wire line to a [`Frame`] variant. Lines without the
//! `data:` prefix, blank payloads, and unrecognized control tags are not
//! frames at all — they are dropped silently, which keeps the protocol
//! forward-compatible with producers this build does not know about.

use crate::wire::{CONTEXT_TAG, DATA_PREFIX, DONE_TOKEN, ERROR_TAG, METADATA_TAG};

/// One classified unit decoded from a line of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A fragment of the answer. May begin with meaningful whitespace.
    Text(String),
    /// Informational, not shown as answer text.
    Metadata(String),
    /// Notice that grounding documents were used; the payload names them.
    Context(String),
    /// Terminal: the stream failed with this producer-supplied message.
    Error(String),
    /// Terminal: the stream completed successfully.
    Done,
}

impl Frame {
    /// True for the two terminal variants.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::Done | Frame::Error(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Classify one decoded line.
///
/// Returns `None` for keep-alive separators, empty payloads, and lines
/// without the `data:` prefix — all silently ignored.
///
/// The payload is the rest of the line after `data:` and at most one
/// following space. Only that single space is consumed: a token fragment
/// like `data:  world` carries a leading space that must survive.
pub fn classify_line(line: &str) -> Option<Frame> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    if payload.trim().is_empty() {
        return None;
    }
    if payload.trim() == DONE_TOKEN {
        return Some(Frame::Done);
    }
    if let Some(rest) = strip_tag(payload, ERROR_TAG) {
        return Some(Frame::Error(rest));
    }
    if let Some(rest) = strip_tag(payload, METADATA_TAG) {
        return Some(Frame::Metadata(rest));
    }
    if let Some(rest) = strip_tag(payload, CONTEXT_TAG) {
        return Some(Frame::Context(rest));
    }
    if looks_like_control_tag(payload) {
        // Unknown control tag from a newer producer. Dropped, not shown.
        return None;
    }
    Some(Frame::Text(payload.to_string()))
}

/// True when a payload opens with `[UPPERCASE]`, the shape reserved for
/// control tags. Bracketed answer text such as `[1] citation` does not
/// match and is rendered normally.
fn looks_like_control_tag(payload: &str) -> bool {
    let Some(rest) = payload.strip_prefix('[') else {
        return false;
    };
    let Some(end) = rest.find(']') else {
        return false;
    };
    let tag = &rest[..end];
    !tag.is_empty() && tag.chars().all(|c| c.is_ascii_uppercase() || c == '_')
}

/// Strip a control tag plus its separating whitespace from a payload.
fn strip_tag(payload: &str, tag: &str) -> Option<String> {
    payload
        .strip_prefix(tag)
        .map(|rest| rest.trim_start().to_string())
}
