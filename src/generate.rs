//! Answer generation seam.
//!
//! The streaming producer treats inference as a black box behind the
//! [`Generator`] trait: hand it a prompt, get back an ordered sequence of
//! token-sized fragments. The default [`CannedGenerator`] is a
//! deterministic stub — it needs no model or API key and exists so the
//! protocol, the corpus, and the CLI can be exercised end to end.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;

use crate::config::GeneratorConfig;
use crate::models::RetrievedChunk;

/// A generation backend. Implementations must be cheap to share across
/// concurrent requests.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier reported to clients in the `[METADATA]` frame.
    fn model_name(&self) -> &str;

    /// Produce the full answer for `prompt` as ordered token fragments.
    /// Fragments carry their own spacing; concatenating them yields the
    /// answer text.
    async fn generate(&self, prompt: &str) -> Result<Vec<String>>;
}

/// Build the grounded prompt handed to the generator when retrieval
/// produced context. Mirrors the plain-question prompt when `context` is
/// empty.
pub fn build_prompt(question: &str, context: &[RetrievedChunk]) -> String {
    if context.is_empty() {
        return question.to_string();
    }

    let mut sections = String::new();
    for (i, chunk) in context.iter().enumerate() {
        sections.push_str(&format!(
            "\nContext {} (from \"{}\"):\n{}\n",
            i + 1,
            chunk.title,
            chunk.text
        ));
    }

    format!(
        "You are an AI assistant that answers questions based on the provided context. \
         Use the following context to answer the user's question. If the context doesn't \
         contain enough information to answer the question, say so clearly.\n\
         \nCONTEXT:\n{}\nQUESTION: {}\n\
         \nPlease provide a comprehensive answer based on the context above. If you \
         reference specific information, mention which document it came from.\n\
         \nANSWER:",
        sections, question
    )
}

/// One-line summary of which sources grounded an answer, sent to clients
/// as the `[CONTEXT]` frame payload. Each title appears once, in the
/// order retrieval first produced it; score-ordered chunks routinely
/// interleave documents.
pub fn describe_sources(context: &[RetrievedChunk]) -> String {
    let mut seen = HashSet::new();
    let titles: Vec<&str> = context
        .iter()
        .map(|c| c.title.as_str())
        .filter(|t| seen.insert(*t))
        .collect();
    format!("Sources: {}", titles.join(", "))
}

/// Deterministic stub backend.
///
/// Echoes a short canned answer derived from the prompt, split into
/// word-sized fragments the way a real model streams tokens.
pub struct CannedGenerator {
    model: String,
}

impl CannedGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl Generator for CannedGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<Vec<String>> {
        // The grounded prompt embeds the question after a QUESTION: label;
        // the plain prompt is the question itself.
        let question = prompt
            .split("QUESTION:")
            .nth(1)
            .and_then(|rest| rest.split('\n').next())
            .unwrap_or(prompt)
            .trim();

        let answer = format!(
            "This is a canned response. You asked: \"{}\". \
             Connect a real model backend to get live answers.",
            question
        );
        Ok(split_tokens(&answer))
    }
}

/// Split an answer into word fragments, each carrying its leading space,
/// so the stream exercises mid-word-free but boundary-unaligned framing.
fn split_tokens(answer: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for word in answer.split_inclusive(' ') {
        current.push_str(word);
        // Emit a couple of words at a time; real producers batch tokens.
        if current.len() >= 12 {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Instantiate the configured generator backend.
pub fn create_generator(config: &GeneratorConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "canned" => Ok(Box::new(CannedGenerator::new(config))),
        other => bail!("Unknown generator provider: {}", other),
    }
}
