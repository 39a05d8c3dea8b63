//! Sliding-window text chunker for corpus documents.
//!
//! Splits a document body into overlapping [`Chunk`]s of bounded size so
//! retrieval can score passages instead of whole documents. Windows
//! prefer to end at a sentence boundary found within the overlap region;
//! failing that, at a whitespace boundary; failing that, a hard cut.
//!
//! Each chunk gets a fresh UUID, its position index, and a SHA-256 hash
//! of its text for staleness detection during sync.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Split `text` into chunks of at most `max_chars`, with consecutive
/// chunks sharing roughly `overlap_chars` of context. Indices are
/// contiguous from 0. Returns a single possibly-empty chunk for short or
/// empty input.
pub fn chunk_text(document_id: &str, text: &str, max_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    let text = text.trim();
    if text.len() <= max_chars {
        return vec![make_chunk(document_id, 0, text)];
    }

    let mut chunks = Vec::new();
    let mut index: i64 = 0;
    let mut start = 0;

    while start < text.len() {
        let hard_end = floor_char_boundary(text, (start + max_chars).min(text.len()));
        let end = if hard_end < text.len() {
            // Search the overlap window for a sentence end, then any
            // whitespace, before falling back to the hard cut.
            let window_start = floor_char_boundary(text, hard_end.saturating_sub(overlap_chars).max(start + 1));
            let window = &text[window_start..hard_end];
            find_sentence_end(window)
                .or_else(|| window.rfind(|c: char| c.is_ascii_whitespace()).map(|p| p + 1))
                .map(|p| window_start + p)
                .unwrap_or(hard_end)
        } else {
            hard_end
        };

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            chunks.push(make_chunk(document_id, index, piece));
            index += 1;
        }

        if end >= text.len() {
            break;
        }
        // Step back by the overlap so adjacent chunks share context,
        // rounding forward to a char boundary to guarantee progress.
        let mut next = end.saturating_sub(overlap_chars).max(start + 1);
        while next < text.len() && !text.is_char_boundary(next) {
            next += 1;
        }
        start = next;
    }

    if chunks.is_empty() {
        chunks.push(make_chunk(document_id, 0, text));
    }
    chunks
}

/// Last sentence terminator (`.`, `!`, `?`) in `window`, as the offset
/// just past it. A terminator must be followed by whitespace or end the
/// window to count, so decimals like `3.14` are not cut.
fn find_sentence_end(window: &str) -> Option<usize> {
    let bytes = window.as_bytes();
    (0..bytes.len())
        .rev()
        .find(|&i| {
            matches!(bytes[i], b'.' | b'!' | b'?')
                && (i + 1 == bytes.len() || bytes[i + 1].is_ascii_whitespace())
        })
        .map(|i| i + 1)
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn make_chunk(document_id: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
