//! The `cchat docs` command family.
//!
//! Thin REST clients for the server's document API. All subcommands talk
//! to the running server rather than the database directly, so they see
//! exactly what the chat endpoint sees.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::config::Config;
use crate::extract;
use crate::models::CorpusStats;

fn http_client(config: &Config) -> Result<(reqwest::Client, String)> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    let base = config.client.base_url.trim_end_matches('/').to_string();
    Ok((client, base))
}

/// Decode the server's JSON error contract into a readable failure.
async fn fail_from_response(resp: reqwest::Response) -> anyhow::Error {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    let status = resp.status();
    match resp.json::<ErrorBody>().await {
        Ok(body) => anyhow::anyhow!("{} ({})", body.error.message, status),
        Err(_) => anyhow::anyhow!("request failed: HTTP {}", status),
    }
}

pub async fn run_add(config: &Config, file: &Path, title: Option<String>) -> Result<()> {
    // Plain text is read as-is; PDFs are extracted to text first.
    let body = extract::read_document(file)?;
    let title = title.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.display().to_string())
    });

    #[derive(Deserialize)]
    struct AddResponse {
        id: String,
        title: String,
        chunks: i64,
    }

    let (client, base) = http_client(config)?;
    let resp = client
        .post(format!("{}/documents/add", base))
        .json(&serde_json::json!({ "title": title, "body": body }))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", base))?;

    if !resp.status().is_success() {
        return Err(fail_from_response(resp).await);
    }

    let added: AddResponse = resp.json().await?;
    println!("added \"{}\" ({} chunks)", added.title, added.chunks);
    println!("  id: {}", added.id);
    Ok(())
}

pub async fn run_remove(config: &Config, id: &str) -> Result<()> {
    let (client, base) = http_client(config)?;
    let resp = client
        .delete(format!("{}/documents/{}", base, id))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", base))?;

    if !resp.status().is_success() {
        return Err(fail_from_response(resp).await);
    }
    println!("removed {}", id);
    Ok(())
}

pub async fn run_clear(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        bail!("refusing to clear the corpus without --yes");
    }

    #[derive(Deserialize)]
    struct ClearResponse {
        message: String,
    }

    let (client, base) = http_client(config)?;
    let resp = client
        .delete(format!("{}/documents/clear", base))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", base))?;

    if !resp.status().is_success() {
        return Err(fail_from_response(resp).await);
    }
    let cleared: ClearResponse = resp.json().await?;
    println!("{}", cleared.message);
    Ok(())
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let (client, base) = http_client(config)?;
    let resp = client
        .get(format!("{}/documents/stats", base))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", base))?;

    if !resp.status().is_success() {
        return Err(fail_from_response(resp).await);
    }
    let stats: CorpusStats = resp.json().await?;

    println!("corpus-chat — Corpus Stats");
    println!("  documents: {}", stats.documents);
    println!("  chunks:    {}", stats.chunks);
    Ok(())
}

pub async fn run_list(config: &Config) -> Result<()> {
    #[derive(Deserialize)]
    struct ListResponse {
        documents: Vec<DocumentInfo>,
    }
    #[derive(Deserialize)]
    struct DocumentInfo {
        id: String,
        title: String,
        source: String,
        chunks: i64,
    }

    let (client, base) = http_client(config)?;
    let resp = client
        .get(format!("{}/documents", base))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", base))?;

    if !resp.status().is_success() {
        return Err(fail_from_response(resp).await);
    }
    let list: ListResponse = resp.json().await?;

    if list.documents.is_empty() {
        println!("corpus is empty");
        return Ok(());
    }
    for doc in list.documents {
        println!("{}  {} [{}] ({} chunks)", doc.id, doc.title, doc.source, doc.chunks);
    }
    Ok(())
}
