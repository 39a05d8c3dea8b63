//! Wire framing for the chat stream.
//!
//! The stream is line-framed: each event is a `data: <payload>` line
//! followed by a blank separator line. Network reads deliver arbitrary
//! byte chunks whose boundaries are unrelated to line boundaries, so the
//! consumer runs every chunk through a [`LineReassembler`] that buffers
//! the unterminated tail between reads.
//!
//! The `encode_*` helpers are the producer side of the same format.

/// Prefix carried by every meaningful frame line.
pub const DATA_PREFIX: &str = "data:";

/// Payload token that terminates a stream successfully.
pub const DONE_TOKEN: &str = "[DONE]";

/// Control-tag prefixes inside a `data:` payload.
pub const ERROR_TAG: &str = "[ERROR]";
pub const METADATA_TAG: &str = "[METADATA]";
pub const CONTEXT_TAG: &str = "[CONTEXT]";

/// Reassembles complete lines from arbitrarily chunked stream data.
///
/// Owned by exactly one in-flight stream; fresh for every session.
/// `feed` never skips or duplicates a line, and `finish` flushes the
/// trailing unterminated fragment when the transport closes.
#[derive(Debug, Default)]
pub struct LineReassembler {
    buffer: String,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every fully terminated line it completes,
    /// in order. The final unterminated remainder stays buffered for the
    /// next call. `\r\n` terminators are tolerated.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=pos).collect();
            line.pop(); // the '\n'
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Flush the remaining buffer as a final partial line, if any.
    ///
    /// Must be called exactly once, after the last `feed`, when the
    /// transport reports end-of-stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buffer);
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }
}

/// Encode a raw answer-text fragment as a wire frame.
pub fn encode_text(content: &str) -> String {
    format!("{} {}\n\n", DATA_PREFIX, content)
}

/// Encode a tagged control frame (`[ERROR]`, `[METADATA]`, `[CONTEXT]`).
pub fn encode_tagged(tag: &str, content: &str) -> String {
    format!("{} {} {}\n\n", DATA_PREFIX, tag, content)
}

/// Encode the stream terminator.
pub fn encode_done() -> String {
    format!("{} {}\n\n", DATA_PREFIX, DONE_TOKEN)
}
