//! TOML configuration.
//!
//! Every section is optional; a missing section takes its defaults, so an
//! empty file yields an in-memory store with embeddings disabled.
//!
//! ```toml
//! [chunking]
//! chunk_size = 20
//! overlap = 5
//!
//! [indexing]
//! batch_size = 64
//! purge_stale_chunks = true
//!
//! [retrieval]
//! top_k = 5
//!
//! [embedding]
//! provider = "openai"            # disabled | openai | ollama | local
//! model = "text-embedding-3-small"
//! dims = 1536
//! timeout_secs = 30
//!
//! [store]
//! backend = "chroma"             # memory | sqlite | chroma
//! url = "http://localhost:8000"
//! collection = "virtual_files"
//! metric = "cosine"              # cosine | l2 | ip
//!
//! [server]
//! bind = "127.0.0.1:7331"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use session_index_core::chunk::{self, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use session_index_core::index::{IndexParams, DEFAULT_BATCH_SIZE};
use session_index_core::metric::DistanceMetric;
use session_index_core::search::DEFAULT_TOP_K;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub purge_stale_chunks: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            purge_stale_chunks: true,
        }
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the `ollama` provider (default `http://localhost:11434`)
    /// or an OpenAI-compatible endpoint for `openai`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
    Chroma,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// SQLite database file (`sqlite` backend).
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Chroma server base URL (`chroma` backend).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_tenant")]
    pub tenant: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            url: None,
            collection: default_collection(),
            tenant: default_tenant(),
            database: default_database(),
            metric: DistanceMetric::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_collection() -> String {
    "virtual_files".to_string()
}
fn default_tenant() -> String {
    "default_tenant".to_string()
}
fn default_database() -> String {
    "default_database".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7331".to_string()
}

impl Config {
    /// Indexing parameters with validated chunking settings.
    pub fn index_params(&self) -> Result<IndexParams> {
        let chunking = chunk::ChunkingConfig::new(self.chunking.chunk_size, self.chunking.overlap)?;
        Ok(IndexParams {
            chunking,
            batch_size: self.indexing.batch_size,
            purge_stale_chunks: self.indexing.purge_stale_chunks,
        })
    }

    /// Check cross-field constraints. Called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        self.index_params()
            .context("invalid [chunking] settings")?;

        if self.indexing.batch_size == 0 {
            bail!("indexing.batch_size must be > 0");
        }
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
                other
            ),
        }
        if self.embedding.provider == "ollama" {
            if self.embedding.model.is_none() {
                bail!("embedding.model must be specified when provider is 'ollama'");
            }
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                bail!("embedding.dims must be > 0 when provider is 'ollama'");
            }
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }
        if self.embedding.timeout_secs == 0 {
            bail!("embedding.timeout_secs must be > 0");
        }

        match self.store.backend {
            StoreBackend::Memory => {}
            StoreBackend::Sqlite => {
                if self.store.path.is_none() {
                    bail!("store.path must be set when backend is 'sqlite'");
                }
            }
            StoreBackend::Chroma => {
                if self.store.url.is_none() {
                    bail!("store.url must be set when backend is 'chroma'");
                }
                if self.store.collection.is_empty() {
                    bail!("store.collection must not be empty");
                }
            }
        }

        Ok(())
    }
}

/// Parse a TOML config string and validate it.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Read, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
