//! Core data models used throughout corpus-chat.
//!
//! These types represent the documents and chunks that flow through the
//! corpus pipeline, plus the request shape shared between the chat client
//! and server.

use serde::{Deserialize, Serialize};

/// Normalized document stored in SQLite.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub title: String,
    /// Origin kind: `"api"` for documents added over the REST API,
    /// `"filesystem"` for folder-synced documents.
    pub source: String,
    /// Natural key within the source: the document id for API documents,
    /// the relative file path for synced ones.
    pub source_id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub body: String,
    pub dedup_hash: String,
}

/// A chunk of a document's body text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk returned by retrieval, with its relevance score and the title
/// of the document it came from.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub document_id: String,
    pub title: String,
    pub text: String,
    pub score: f64,
}

/// Corpus size summary, served by `GET /documents/stats`.
///
/// The chat client only needs `documents` to decide whether grounding can
/// have any effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusStats {
    pub documents: i64,
    pub chunks: i64,
}

/// One chat submission. Field names match the JSON body of
/// `POST /chat/stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub use_rag: bool,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, use_rag: bool) -> Self {
        Self {
            message: message.into(),
            use_rag,
        }
    }
}
