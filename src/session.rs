//! Stream session state machine.
//!
//! A [`StreamSession`] covers the lifecycle of one request's streaming
//! response, from submission to a terminal state. Decoded lines are
//! applied in order by a single dispatch path; the session classifies
//! them, routes control frames, and feeds answer text through the
//! [`Segmenter`](crate::segment::Segmenter).
//!
//! Terminal states are absorbing: once `[DONE]` or `[ERROR]` has been
//! observed, anything still in the buffer is ignored. A new request
//! always builds a fresh session.

use crate::config::StreamConfig;
use crate::frame::{classify_line, Frame};
use crate::segment::{DisplayUnit, Segmenter};

/// Lifecycle status of one in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }
}

/// Failure message shown when the transport drops before a terminator.
pub const ABRUPT_CLOSE_MESSAGE: &str = "stream ended unexpectedly";

/// State for one streaming response.
#[derive(Debug)]
pub struct StreamSession {
    status: SessionStatus,
    segmenter: Segmenter,
    display_units: Vec<DisplayUnit>,
    /// One-time informational banner; a later `[CONTEXT]` frame in the
    /// same stream replaces it.
    context_banner: Option<String>,
    /// Diagnostic sink for `[METADATA]` frames. Never rendered as answer
    /// text.
    metadata: Vec<String>,
    error: Option<String>,
}

impl StreamSession {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            status: SessionStatus::Idle,
            segmenter: Segmenter::new(config),
            display_units: Vec::new(),
            context_banner: None,
            metadata: Vec::new(),
            error: None,
        }
    }

    /// Mark the request as issued. Called once, before any line is applied.
    pub fn start(&mut self) {
        if self.status == SessionStatus::Idle {
            self.status = SessionStatus::Streaming;
        }
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn display_units(&self) -> &[DisplayUnit] {
        &self.display_units
    }

    pub fn context_banner(&self) -> Option<&str> {
        self.context_banner.as_deref()
    }

    pub fn metadata(&self) -> &[String] {
        &self.metadata
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Apply one decoded wire line. Lines after a terminal frame are
    /// ignored, as are lines that classify to nothing.
    pub fn apply_line(&mut self, line: &str) {
        if self.status != SessionStatus::Streaming {
            return;
        }
        let Some(frame) = classify_line(line) else {
            return;
        };
        self.apply_frame(frame);
    }

    fn apply_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Done => {
                self.display_units.extend(self.segmenter.flush());
                self.status = SessionStatus::Completed;
            }
            Frame::Error(message) => {
                self.display_units.extend(self.segmenter.flush());
                self.error = Some(message);
                self.status = SessionStatus::Failed;
            }
            Frame::Metadata(text) => self.metadata.push(text),
            Frame::Context(text) => self.context_banner = Some(text),
            Frame::Text(content) => {
                self.display_units.extend(self.segmenter.push(&content));
            }
        }
    }

    /// The transport reported end-of-stream. Completion requires an
    /// explicit terminator; an abrupt close while still streaming is a
    /// failure, with partial output retained.
    pub fn end_of_stream(&mut self) {
        if self.status != SessionStatus::Streaming {
            return;
        }
        self.display_units.extend(self.segmenter.flush());
        self.error = Some(ABRUPT_CLOSE_MESSAGE.to_string());
        self.status = SessionStatus::Failed;
    }

    /// A transport-level error surfaced mid-stream.
    pub fn fail_transport(&mut self, message: impl Into<String>) {
        if self.status != SessionStatus::Streaming {
            return;
        }
        self.display_units.extend(self.segmenter.flush());
        self.error = Some(message.into());
        self.status = SessionStatus::Failed;
    }

    /// Caller-initiated cancellation. Silent: no error is recorded,
    /// nothing is rolled back, and any text still in the accumulator is
    /// flushed so partial answers stay visible.
    pub fn cancel(&mut self) {
        if self.status == SessionStatus::Streaming {
            self.display_units.extend(self.segmenter.flush());
            self.status = SessionStatus::Cancelled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::DisplayUnit;

    fn streaming_session() -> StreamSession {
        let mut s = StreamSession::new(&StreamConfig::default());
        s.start();
        s
    }

    fn texts(session: &StreamSession) -> Vec<&str> {
        session
            .display_units()
            .iter()
            .map(|u| u.text.as_str())
            .collect()
    }

    #[test]
    fn test_fragments_coalesce_then_complete() {
        let mut s = streaming_session();
        for line in ["data: Hello", "", "data:  world", "", "data: [DONE]", ""] {
            s.apply_line(line);
        }
        assert_eq!(texts(&s), vec!["Hello world"]);
        assert_eq!(s.status(), &SessionStatus::Completed);
    }

    #[test]
    fn test_bullet_items_stream() {
        let mut s = streaming_session();
        for line in ["data: - first point", "data: - second point", "data: [DONE]"] {
            s.apply_line(line);
        }
        assert_eq!(
            s.display_units(),
            &[
                DisplayUnit::bullet("first point"),
                DisplayUnit::bullet("second point"),
            ]
        );
        assert_eq!(s.status(), &SessionStatus::Completed);
    }

    #[test]
    fn test_abrupt_close_fails_but_retains_output() {
        let mut s = streaming_session();
        s.apply_line("data: partial answer text");
        s.end_of_stream();
        assert_eq!(s.status(), &SessionStatus::Failed);
        assert_eq!(texts(&s), vec!["partial answer text"]);
        assert_eq!(s.error(), Some(ABRUPT_CLOSE_MESSAGE));
    }

    #[test]
    fn test_error_frame_fails_session() {
        let mut s = streaming_session();
        s.apply_line("data: [ERROR] model unavailable");
        assert_eq!(s.status(), &SessionStatus::Failed);
        assert_eq!(s.error(), Some("model unavailable"));
        assert!(s.display_units().is_empty());
    }

    #[test]
    fn test_cancel_retains_fragments() {
        let mut s = streaming_session();
        s.apply_line("data: first fragment\n"); // embedded newline closes a unit
        s.apply_line("data: second fragment");
        s.cancel();
        assert_eq!(s.status(), &SessionStatus::Cancelled);
        assert_eq!(texts(&s), vec!["first fragment", "second fragment"]);
        assert_eq!(s.error(), None);
    }

    #[test]
    fn test_terminal_precedence_after_done() {
        let mut s = streaming_session();
        s.apply_line("data: kept");
        s.apply_line("data: [DONE]");
        // Everything after the terminator is dead.
        s.apply_line("data: dropped");
        s.apply_line("data: [ERROR] too late");
        assert_eq!(s.status(), &SessionStatus::Completed);
        assert_eq!(texts(&s), vec!["kept"]);
        assert_eq!(s.error(), None);
    }

    #[test]
    fn test_terminal_precedence_after_error() {
        let mut s = streaming_session();
        s.apply_line("data: [ERROR] boom");
        s.apply_line("data: [DONE]");
        assert_eq!(s.status(), &SessionStatus::Failed);
        assert_eq!(s.error(), Some("boom"));
    }

    #[test]
    fn test_end_of_stream_after_done_is_noop() {
        let mut s = streaming_session();
        s.apply_line("data: fine");
        s.apply_line("data: [DONE]");
        s.end_of_stream();
        assert_eq!(s.status(), &SessionStatus::Completed);
        assert_eq!(s.error(), None);
    }

    #[test]
    fn test_context_banner_replaced_not_appended() {
        let mut s = streaming_session();
        s.apply_line("data: [CONTEXT] Sources: alpha.md");
        s.apply_line("data: [CONTEXT] Sources: alpha.md, beta.md");
        assert_eq!(s.context_banner(), Some("Sources: alpha.md, beta.md"));
    }

    #[test]
    fn test_metadata_collected_not_rendered() {
        let mut s = streaming_session();
        s.apply_line("data: [METADATA] model=canned-echo-1");
        s.apply_line("data: answer");
        s.apply_line("data: [DONE]");
        assert_eq!(s.metadata(), &["model=canned-echo-1".to_string()]);
        assert_eq!(texts(&s), vec!["answer"]);
    }

    #[test]
    fn test_error_flushes_pending_fragment() {
        let mut s = streaming_session();
        s.apply_line("data: partial");
        s.apply_line("data: [ERROR] cut off");
        assert_eq!(texts(&s), vec!["partial"]);
        assert_eq!(s.status(), &SessionStatus::Failed);
    }

    #[test]
    fn test_cancel_before_start_stays_idle() {
        let mut s = StreamSession::new(&StreamConfig::default());
        s.cancel();
        assert_eq!(s.status(), &SessionStatus::Idle);
    }
}
