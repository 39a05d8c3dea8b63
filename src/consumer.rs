//! Streaming chat client.
//!
//! [`ChatClient::submit`] issues the `POST /chat/stream` request and spawns
//! a read loop over the response byte stream. Each network chunk runs
//! through the [`LineReassembler`]; decoded lines are applied to the
//! [`StreamSession`] in arrival order, from that single task only. The
//! session mutex exists so observers (CLI rendering, tests) can take
//! consistent snapshots, not to fan out mutation.
//!
//! Cancellation is cooperative: a `watch` channel is checked at every
//! suspension point, so a triggered cancel exits at the next await rather
//! than waiting for the producer to close the connection. Dropping the
//! [`StreamHandle`] has the same effect, which is what makes starting a
//! new request implicitly discard a still-streaming prior one.
//!
//! Nothing here retries. Transport failures, producer-signalled errors,
//! and abrupt closes all resolve to a terminal session status; offering a
//! resubmission action is the caller's job.

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{ClientConfig, StreamConfig};
use crate::models::{ChatRequest, CorpusStats};
use crate::segment::DisplayUnit;
use crate::session::{SessionStatus, StreamSession};
use crate::wire::LineReassembler;

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    stream_config: StreamConfig,
}

impl ChatClient {
    pub fn new(client: &ClientConfig, stream: &StreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(client.connect_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: client.base_url.trim_end_matches('/').to_string(),
            stream_config: stream.clone(),
        })
    }

    /// Corpus-size query used to warn when grounding is requested against
    /// an empty corpus.
    pub async fn corpus_stats(&self) -> Result<CorpusStats> {
        let url = format!("{}/documents/stats", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;
        if !resp.status().is_success() {
            bail!("stats request failed: HTTP {}", resp.status());
        }
        Ok(resp.json().await?)
    }

    /// Start streaming one request.
    ///
    /// An empty or whitespace-only prompt is rejected here, before any
    /// network call; the session never leaves `Idle`. Everything after
    /// that — connect errors, non-success status, mid-stream failures —
    /// resolves through the returned handle's session state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, request: ChatRequest) -> Result<StreamHandle> {
        if request.message.trim().is_empty() {
            bail!("prompt must not be empty");
        }

        let session = Arc::new(Mutex::new(StreamSession::new(&self.stream_config)));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (update_tx, update_rx) = watch::channel(());

        let task = tokio::spawn(run_stream(
            self.http.clone(),
            format!("{}/chat/stream", self.base_url),
            request,
            session.clone(),
            cancel_rx,
            update_tx,
        ));

        Ok(StreamHandle {
            session,
            cancel: cancel_tx,
            updates: update_rx,
            task,
        })
    }
}

/// Observable surface of one in-flight stream.
///
/// Dropping the handle cancels the stream.
pub struct StreamHandle {
    session: Arc<Mutex<StreamSession>>,
    cancel: watch::Sender<bool>,
    updates: watch::Receiver<()>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Request cancellation. The read loop exits at its next suspension
    /// point; already-produced display units are retained.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// A receiver marked changed after every session update, so renderers
    /// can wait for progress instead of polling on a timer. The sender
    /// side closes when the stream task finishes; a closed receiver means
    /// the session has reached its terminal state.
    pub fn updates(&self) -> watch::Receiver<()> {
        self.updates.clone()
    }

    /// Wait for the stream to reach a terminal state and return it.
    pub async fn wait(self) -> SessionStatus {
        let StreamHandle {
            session,
            cancel,
            updates: _,
            task,
        } = self;
        let _ = task.await;
        drop(cancel);
        let status = lock(&session).status().clone();
        status
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.session).status().clone()
    }

    pub fn display_units(&self) -> Vec<DisplayUnit> {
        lock(&self.session).display_units().to_vec()
    }

    pub fn context_banner(&self) -> Option<String> {
        lock(&self.session).context_banner().map(str::to_string)
    }

    pub fn metadata(&self) -> Vec<String> {
        lock(&self.session).metadata().to_vec()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.session).error().map(str::to_string)
    }
}

fn lock(session: &Arc<Mutex<StreamSession>>) -> MutexGuard<'_, StreamSession> {
    session.lock().unwrap_or_else(|e| e.into_inner())
}

/// The read loop for one stream. Sole owner of the dispatch path. Every
/// session mutation is followed by a signal on `updates`; dropping the
/// sender on return tells observers no further changes are coming.
async fn run_stream(
    http: reqwest::Client,
    url: String,
    request: ChatRequest,
    session: Arc<Mutex<StreamSession>>,
    mut cancel: watch::Receiver<bool>,
    updates: watch::Sender<()>,
) {
    lock(&session).start();
    let _ = updates.send(());

    // Cancellation can land while the request is still connecting.
    let resp = tokio::select! {
        _ = cancel.changed() => {
            lock(&session).cancel();
            return;
        }
        resp = http
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(&request)
            .send() => resp,
    };

    let resp = match resp {
        Ok(resp) => resp,
        Err(e) => {
            lock(&session).fail_transport(format!("request failed: {}", e));
            return;
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let preview = if body.len() > 200 {
            format!("{}...", &body[..200])
        } else {
            body
        };
        lock(&session).fail_transport(format!("HTTP {}: {}", status, preview));
        return;
    }

    let mut stream = resp.bytes_stream();
    let mut reassembler = LineReassembler::new();
    // Bytes of a UTF-8 sequence split across network chunks.
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let next = tokio::select! {
            _ = cancel.changed() => {
                lock(&session).cancel();
                return;
            }
            chunk = stream.next() => chunk,
        };

        match next {
            Some(Ok(bytes)) => {
                pending.extend_from_slice(&bytes);
                let text = take_valid_utf8(&mut pending);
                let terminal = {
                    let mut session = lock(&session);
                    let mut terminal = false;
                    for line in reassembler.feed(&text) {
                        session.apply_line(&line);
                        if session.is_terminal() {
                            terminal = true;
                            break;
                        }
                    }
                    terminal
                };
                let _ = updates.send(());
                if terminal {
                    return;
                }
            }
            Some(Err(e)) => {
                lock(&session).fail_transport(format!("stream read failed: {}", e));
                return;
            }
            None => {
                let mut session = lock(&session);
                if let Some(last) = reassembler.finish() {
                    session.apply_line(&last);
                }
                // No-op if a terminator was already applied; otherwise an
                // abrupt close, which fails the session.
                session.end_of_stream();
                return;
            }
        }
    }
}

/// Split off the longest decodable UTF-8 prefix of `pending`. A trailing
/// incomplete sequence stays buffered for the next chunk; genuinely
/// invalid bytes are replaced so the buffer can never stall.
fn take_valid_utf8(pending: &mut Vec<u8>) -> String {
    let mut out = String::new();
    loop {
        match std::str::from_utf8(pending) {
            Ok(s) => {
                out.push_str(s);
                pending.clear();
                return out;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&pending[..valid]));
                match e.error_len() {
                    Some(bad) => {
                        out.push('\u{FFFD}');
                        pending.drain(..valid + bad);
                    }
                    None => {
                        // Incomplete tail; wait for more bytes.
                        pending.drain(..valid);
                        return out;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_valid_utf8_holds_split_sequence() {
        // "é" is 0xC3 0xA9; deliver the first byte alone.
        let mut pending = b"caf\xC3".to_vec();
        let text = take_valid_utf8(&mut pending);
        assert_eq!(text, "caf");
        assert_eq!(pending, vec![0xC3]);

        pending.push(0xA9);
        let text = take_valid_utf8(&mut pending);
        assert_eq!(text, "é");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_take_valid_utf8_ascii_passthrough() {
        let mut pending = b"data: Hello\n".to_vec();
        assert_eq!(take_valid_utf8(&mut pending), "data: Hello\n");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected_locally() {
        let client =
            ChatClient::new(&ClientConfig::default(), &StreamConfig::default()).unwrap();
        assert!(client.submit(ChatRequest::new("", false)).is_err());
        assert!(client.submit(ChatRequest::new("   \n", true)).is_err());
    }
}
