use crate::error::{IndexerError, Result};
use docindex_chunker::ChunkingConfig;
use docindex_storage::StorageConfig;
use docindex_vector_store::{Embedder, HttpEmbedder, StubEmbedder, DEFAULT_DIMENSION, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_DB_FILE: &str = "docindex.db";
pub const DEFAULT_EMBEDDING_ENDPOINT: &str = "https://api.openai.com/v1";

/// Environment variable naming a TOML config file
pub const CONFIG_ENV: &str = "DOCINDEX_CONFIG";

/// Runtime configuration: defaults, then a TOML file, then `DOCINDEX_*` variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocIndexConfig {
    pub db_file: PathBuf,
    pub max_connections: usize,

    /// Unset means acquisition blocks until a connection is free
    pub acquire_timeout_ms: Option<u64>,

    pub vector_dim: usize,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
}

impl Default for DocIndexConfig {
    fn default() -> Self {
        Self {
            db_file: PathBuf::from(DEFAULT_DB_FILE),
            max_connections: docindex_storage::DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_ms: None,
            vector_dim: DEFAULT_DIMENSION,
            embedding: EmbeddingConfig::default(),
            chunking: ChunkingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub mode: EmbeddingMode,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Stub,
            endpoint: DEFAULT_EMBEDDING_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    Stub,
    Http,
}

impl std::str::FromStr for EmbeddingMode {
    type Err = IndexerError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(Self::Stub),
            "http" => Ok(Self::Http),
            other => Err(IndexerError::Config(format!(
                "unsupported embedding mode '{other}' (expected 'stub' or 'http')"
            ))),
        }
    }
}

impl DocIndexConfig {
    /// Load from `path` (or `$DOCINDEX_CONFIG`) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            IndexerError::Config(format!("read config {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
            .map_err(|err| IndexerError::Config(format!("{}: {err}", path.display())))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|err| IndexerError::Config(err.to_string()))
    }

    /// Apply `DOCINDEX_*` overrides read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(db_file) = lookup("DOCINDEX_DB_FILE") {
            self.db_file = PathBuf::from(db_file);
        }
        if let Some(raw) = lookup("DOCINDEX_MAX_CONNECTIONS") {
            self.max_connections = parse_number("DOCINDEX_MAX_CONNECTIONS", &raw)?;
        }
        if let Some(raw) = lookup("DOCINDEX_ACQUIRE_TIMEOUT_MS") {
            self.acquire_timeout_ms = Some(parse_number("DOCINDEX_ACQUIRE_TIMEOUT_MS", &raw)?);
        }
        if let Some(raw) = lookup("DOCINDEX_VECTOR_DIM") {
            self.vector_dim = parse_number("DOCINDEX_VECTOR_DIM", &raw)?;
        }
        if let Some(raw) = lookup("DOCINDEX_EMBEDDING_MODE") {
            self.embedding.mode = raw.parse()?;
        }
        if let Some(endpoint) = lookup("DOCINDEX_EMBEDDING_ENDPOINT") {
            self.embedding.endpoint = endpoint;
        }
        if let Some(model) = lookup("DOCINDEX_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(key) = lookup("DOCINDEX_EMBEDDING_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.embedding.api_key = Some(key);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(IndexerError::Config("max_connections must be > 0".into()));
        }
        if self.vector_dim == 0 {
            return Err(IndexerError::Config("vector_dim must be > 0".into()));
        }
        self.chunking
            .validate()
            .map_err(|err| IndexerError::Config(format!("chunking: {err}")))?;
        Ok(())
    }

    #[must_use]
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::new(&self.db_file)
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout_ms.map(Duration::from_millis))
    }

    /// Embedder selected by `embedding.mode`
    pub fn build_embedder(&self) -> Result<Arc<dyn Embedder>> {
        match self.embedding.mode {
            EmbeddingMode::Stub => Ok(Arc::new(StubEmbedder::new(self.vector_dim))),
            EmbeddingMode::Http => Ok(Arc::new(HttpEmbedder::new(
                &self.embedding.endpoint,
                &self.embedding.model,
                self.embedding.api_key.clone(),
                self.vector_dim,
            )?)),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err| IndexerError::Config(format!("{key}='{raw}': {err}")))
}
