//! Folder-scan bulk ingestion.
//!
//! Walks the configured sync root, filters files through include/exclude
//! globs, and reconciles the corpus against what is on disk: unchanged
//! files (by content hash) are skipped, changed and new files are
//! upserted, and documents whose files disappeared are pruned.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::{Config, SyncConfig};
use crate::corpus::CorpusStore;
use crate::db;
use crate::extract;
use crate::migrate;

/// Source kind recorded for folder-synced documents.
const SYNC_SOURCE: &str = "filesystem";

/// A file selected by the scan, normalized for ingestion.
struct ScannedFile {
    relative_path: String,
    title: String,
    body: String,
}

/// Outcome of one folder scan: the readable files plus a count of files
/// that matched the globs but could not be read or extracted.
struct ScanReport {
    files: Vec<ScannedFile>,
    unreadable: u64,
}

pub async fn run_sync(config: &Config, dry_run: bool, limit: Option<usize>) -> Result<()> {
    let sync_config = config
        .sync
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("No [sync] section configured"))?;

    let report = scan_folder(sync_config)?;
    let unreadable = report.unreadable;
    let mut files = report.files;
    if let Some(limit) = limit {
        files.truncate(limit);
    }

    if dry_run {
        println!("sync (dry-run)");
        println!("  files found: {}", files.len());
        for f in &files {
            println!("  {}", f.relative_path);
        }
        if unreadable > 0 {
            println!("  unreadable (skipped): {}", unreadable);
        }
        return Ok(());
    }

    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;
    let store = CorpusStore::new(pool, config.chunking.clone(), config.retrieval.clone());

    let mut added = 0u64;
    let mut skipped = 0u64;
    let scanned: HashSet<String> = files.iter().map(|f| f.relative_path.clone()).collect();

    for file in &files {
        let hash = hash_text(&file.body);
        let stored = store.dedup_hash(SYNC_SOURCE, &file.relative_path).await?;
        if stored.as_deref() == Some(hash.as_str()) {
            skipped += 1;
            continue;
        }
        store
            .add_document(&file.title, &file.body, SYNC_SOURCE, &file.relative_path)
            .await
            .with_context(|| format!("Failed to ingest {}", file.relative_path))?;
        added += 1;
    }

    // Prune documents whose source files no longer exist.
    let mut pruned = 0u64;
    for (id, source_id) in store.source_ids(SYNC_SOURCE).await? {
        if !scanned.contains(&source_id) {
            store.remove_document(&id).await?;
            pruned += 1;
        }
    }

    println!("sync complete");
    println!("  upserted: {}", added);
    println!("  unchanged: {}", skipped);
    println!("  pruned: {}", pruned);
    println!("  unreadable: {}", unreadable);

    Ok(())
}

/// Walk the sync root and return matching files in deterministic order.
/// A file that cannot be read or extracted is skipped with a warning, not
/// a fatal error.
fn scan_folder(config: &SyncConfig) -> Result<ScanReport> {
    let root = &config.root;
    if !root.exists() {
        bail!("Sync root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    let mut unreadable = 0u64;

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match load_file(path, &rel_str) {
            Ok(file) => files.push(file),
            Err(e) => {
                eprintln!("warning: skipping {}: {}", rel_str, e);
                unreadable += 1;
            }
        }
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(ScanReport { files, unreadable })
}

fn load_file(path: &Path, relative_path: &str) -> Result<ScannedFile> {
    let body = extract::read_document(path)?;
    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| relative_path.to_string());

    Ok(ScannedFile {
        relative_path: relative_path.to_string(),
        title,
        body,
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
