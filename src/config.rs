use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub sync: Option<SyncConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_chunk_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_chunk_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Maximum number of chunks handed to the generator as grounding context.
    #[serde(default = "default_max_results")]
    pub max_results: i64,
    /// Minimum term-overlap score for a chunk to count as relevant.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            min_score: default_min_score(),
        }
    }
}

fn default_max_results() -> i64 {
    5
}
fn default_min_score() -> f64 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    /// Generator backend: currently only `"canned"`.
    #[serde(default = "default_generator")]
    pub provider: String,
    /// Model name reported in the stream's `[METADATA]` frame.
    #[serde(default = "default_model_name")]
    pub model: String,
    /// Delay between emitted token frames, in milliseconds. Zero disables
    /// pacing; a small value makes local demos stream visibly.
    #[serde(default)]
    pub token_delay_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_generator(),
            model: default_model_name(),
            token_delay_ms: 0,
        }
    }
}

fn default_generator() -> String {
    "canned".to_string()
}
fn default_model_name() -> String {
    "canned-echo-1".to_string()
}

/// Segmentation boundary settings. The bullet and label patterns are
/// deliberately configurable; the defaults mirror what models commonly emit
/// but are known to be heuristic.
#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    #[serde(default = "default_bullet_marker")]
    pub bullet_marker: String,
    /// Treat `<digits> <word> :` sequences as the start of a new unit.
    #[serde(default = "default_true")]
    pub label_boundaries: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bullet_marker: default_bullet_marker(),
            label_boundaries: true,
        }
    }
}

fn default_bullet_marker() -> String {
    "- ".to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Timeout for establishing the streaming connection, in seconds.
    /// No read timeout is applied to the stream itself; the producer is
    /// trusted to terminate.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_connect_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
        "**/*.pdf".to_string(),
    ]
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.max_chars");
    }

    // Validate retrieval
    if config.retrieval.max_results < 1 {
        anyhow::bail!("retrieval.max_results must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.min_score) {
        anyhow::bail!("retrieval.min_score must be in [0.0, 1.0]");
    }

    // Validate generator
    match config.generator.provider.as_str() {
        "canned" => {}
        other => anyhow::bail!("Unknown generator provider: '{}'. Must be canned.", other),
    }

    // Validate stream
    if config.stream.bullet_marker.is_empty() {
        anyhow::bail!("stream.bullet_marker must not be empty");
    }

    Ok(config)
}
