
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::chunking::ChunkingConfig;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 3072;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenRouterConfig {
    pub api_host: String,
    /// API key; falls back to the OPENROUTER_API_KEY environment variable when unset.
    pub api_key: Option<String>,
    pub embedding_model: String,
    pub chat_model: String,
    pub embedding_dimension: u32,
    pub batch_size: u32,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_host: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            embedding_model: "text-embedding-3-large".to_string(),
            chat_model: "openai/gpt-4o-mini".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: 10,
            max_retries: 3,
            base_delay_ms: 1000,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub collection: String,
    pub default_top_k: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            collection: "docs".to_string(),
            default_top_k: 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid API host: {0}")]
    InvalidApiHost(String),
    #[error("Missing API key: set openrouter.api_key or the OPENROUTER_API_KEY environment variable")]
    MissingApiKey,
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 8192)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid max retries: {0} (must be between 1 and 10)")]
    InvalidMaxRetries(u32),
    #[error("Invalid chunk size: {0} (must be between 50 and 8000)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid collection name: {0} (cannot be empty)")]
    InvalidCollection(String),
    #[error("Invalid top_k: 0 (must be at least 1)")]
    InvalidTopK,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                openrouter: OpenRouterConfig::default(),
                chunking: ChunkingConfig::default(),
                storage: StorageConfig::default(),
                base_dir: config_dir.as_ref().to_path_buf(),
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.base_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.openrouter.validate()?;
        self.validate_chunking_config()?;

        if self.storage.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(
                self.storage.collection.clone(),
            ));
        }

        if self.storage.default_top_k == 0 {
            return Err(ConfigError::InvalidTopK);
        }

        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if !(50..=8000).contains(&config.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                config.chunk_overlap,
                config.chunk_size,
            ));
        }

        Ok(())
    }

    /// Get the path for the vector database directory
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.base_dir.join("vectors")
    }
}

impl OpenRouterConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.api_host)
            .map_err(|_| ConfigError::InvalidApiHost(self.api_host.clone()))?;

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(64..=8192).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if self.max_retries == 0 || self.max_retries > 10 {
            return Err(ConfigError::InvalidMaxRetries(self.max_retries));
        }

        Ok(())
    }

    /// Resolve the API key from config or environment
    #[inline]
    pub fn api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        std::env::var("OPENROUTER_API_KEY").map_err(|_| ConfigError::MissingApiKey)
    }

    #[inline]
    pub fn api_url(&self, path: &str) -> Result<Url, ConfigError> {
        let base = format!("{}/", self.api_host.trim_end_matches('/'));
        let url = Url::parse(&base)
            .and_then(|base| base.join(path))
            .map_err(|_| ConfigError::InvalidApiHost(self.api_host.clone()))?;
        Ok(url)
    }

    #[inline]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
