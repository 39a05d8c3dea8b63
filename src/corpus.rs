//! Document corpus store.
//!
//! Backs the document management API and retrieval with SQLite. Documents
//! are chunked on insert; retrieval scores chunks by query-term overlap
//! and returns the best passages above a relevance threshold.
//!
//! The streaming protocol treats retrieval as a black box; the scoring
//! here is plain term overlap. A chunk's score is the fraction of
//! distinct query terms it contains.

use anyhow::{Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, RetrievalConfig};
use crate::models::{CorpusStats, RetrievedChunk};

#[derive(Clone)]
pub struct CorpusStore {
    pool: SqlitePool,
    chunking: ChunkingConfig,
    retrieval: RetrievalConfig,
}

/// Summary of one stored document, as returned by add/list operations.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub title: String,
    pub source: String,
    pub chunks: i64,
}

impl CorpusStore {
    pub fn new(pool: SqlitePool, chunking: ChunkingConfig, retrieval: RetrievalConfig) -> Self {
        Self {
            pool,
            chunking,
            retrieval,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace a document, rechunking its body. The `(source,
    /// source_id)` pair is the natural key; a replaced document keeps its
    /// original `created_at`.
    pub async fn add_document(
        &self,
        title: &str,
        body: &str,
        source: &str,
        source_id: &str,
    ) -> Result<StoredDocument> {
        let now = Utc::now().timestamp();
        let dedup_hash = hash_text(body);

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id, created_at FROM documents WHERE source = ? AND source_id = ?")
            .bind(source)
            .bind(source_id)
            .fetch_optional(&mut *tx)
            .await?;

        let created_at = existing
            .as_ref()
            .map(|row| row.get::<i64, _>("created_at"))
            .unwrap_or(now);

        if let Some(row) = existing {
            let old_id: String = row.get("id");
            sqlx::query("DELETE FROM documents WHERE id = ?")
                .bind(&old_id)
                .execute(&mut *tx)
                .await?;
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO documents (id, title, source, source_id, created_at, updated_at, body, dedup_hash) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(title)
        .bind(source)
        .bind(source_id)
        .bind(created_at)
        .bind(now)
        .bind(body)
        .bind(&dedup_hash)
        .execute(&mut *tx)
        .await?;

        let chunks = chunk_text(&id, body, self.chunking.max_chars, self.chunking.overlap_chars);
        for chunk in &chunks {
            sqlx::query(
                "INSERT INTO chunks (id, document_id, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(StoredDocument {
            id,
            title: title.to_string(),
            source: source.to_string(),
            chunks: chunks.len() as i64,
        })
    }

    /// Remove a document and its chunks. Returns false if the id is
    /// unknown.
    pub async fn remove_document(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every document. Returns the number removed.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM documents")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn stats(&self) -> Result<CorpusStats> {
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(CorpusStats { documents, chunks })
    }

    /// All documents, newest first.
    pub async fn list_documents(&self) -> Result<Vec<StoredDocument>> {
        let rows = sqlx::query(
            "SELECT d.id, d.title, d.source, COUNT(c.id) AS chunks \
             FROM documents d LEFT JOIN chunks c ON c.document_id = d.id \
             GROUP BY d.id ORDER BY d.updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| StoredDocument {
                id: row.get("id"),
                title: row.get("title"),
                source: row.get("source"),
                chunks: row.get("chunks"),
            })
            .collect())
    }

    /// Dedup hash of the stored document for a natural key, if present.
    /// Lets sync skip unchanged files.
    pub async fn dedup_hash(&self, source: &str, source_id: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT dedup_hash FROM documents WHERE source = ? AND source_id = ?")
            .bind(source)
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("dedup_hash")))
    }

    /// Document ids for a source kind, keyed by source_id. Used by sync to
    /// prune documents whose files disappeared.
    pub async fn source_ids(&self, source: &str) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT id, source_id FROM documents WHERE source = ?")
            .bind(source)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("id"), r.get("source_id")))
            .collect())
    }

    /// Retrieve the chunks most relevant to `query`, best first.
    ///
    /// Empty after tokenization means no results, never an error — the
    /// caller decides whether an ungrounded answer is acceptable.
    pub async fn search(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT c.document_id, c.text, d.title FROM chunks c \
             JOIN documents d ON d.id = c.document_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load chunks for retrieval")?;

        let mut scored: Vec<RetrievedChunk> = rows
            .into_iter()
            .filter_map(|row| {
                let text: String = row.get("text");
                let score = overlap_score(&terms, &text);
                if score < self.retrieval.min_score {
                    return None;
                }
                Some(RetrievedChunk {
                    document_id: row.get("document_id"),
                    title: row.get("title"),
                    text,
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.retrieval.max_results as usize);
        Ok(scored)
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lowercased alphanumeric terms of length >= 2, deduplicated.
fn tokenize(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(str::to_string)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

/// Fraction of query terms present in `text`, case-insensitive.
fn overlap_score(terms: &[String], text: &str) -> f64 {
    let haystack = text.to_lowercase();
    let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
    hits as f64 / terms.len() as f64
}
