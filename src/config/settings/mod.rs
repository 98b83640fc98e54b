#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::ollama::DEFAULT_EMBEDDING_DIMENSION;

pub const SERPAPI_KEY_ENV: &str = "SERPAPI_API_KEY";
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

/// Documentation pages indexed by `codexr ingest` when no URL is given
pub const DEFAULT_DOC_URLS: [&str; 5] = [
    "https://docs.unity3d.com/Manual/xr_input.html",
    "https://docs.unity3d.com/Manual/xr-interaction-overview.html",
    "https://docs.unrealengine.com/5.0/en-US/virtual-reality-development-in-unreal-engine/",
    "https://docs.unrealengine.com/5.0/en-US/multiplayer-in-unreal-engine/",
    "https://docs.unity3d.com/Manual/SL-Reference.html",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Remote embeddings from an Ollama server
    Ollama,
    /// Offline feature-hashing embeddings
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub dimension: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Ollama,
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
            dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompletionBackend {
    /// Canned replies, no network access
    Placeholder,
    /// Ollama `/api/generate`
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionConfig {
    pub backend: CompletionBackend,
    pub model: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            backend: CompletionBackend::Placeholder,
            model: "GPT-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub engine: String,
    pub timeout_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://serpapi.com/search.json".to_string(),
            engine: "google".to_string(),
            timeout_seconds: 15,
        }
    }
}

impl SearchConfig {
    /// API key from the config file, falling back to `SERPAPI_API_KEY`
    #[inline]
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), SERPAPI_KEY_ENV)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
        }
    }
}

impl SpeechConfig {
    /// API key from the config file, falling back to `OPENAI_API_KEY`
    #[inline]
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.as_deref(), OPENAI_KEY_ENV)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoaderConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub urls: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            user_agent: "codexr/0.1.0 (Documentation Loader)".to_string(),
            urls: DEFAULT_DOC_URLS.iter().map(|u| (*u).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 8 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid top_k: {0} (must be between 1 and 50)")]
    InvalidTopK(usize),
    #[error("Invalid timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid max body size: {0} (must be at least 1024 bytes)")]
    InvalidBodySize(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

fn resolve_key(configured: Option<&str>, env_var: &str) -> Option<String> {
    configured
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(ToString::to_string)
        .or_else(|| {
            std::env::var(env_var)
                .ok()
                .filter(|key| !key.trim().is_empty())
        })
}

impl Config {
    /// Default configuration directory, `~/.codexr`
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".codexr"))
            .or_else(|| dirs::data_dir().map(|data| data.join("codexr")))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
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

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.chunking.validate()?;

        if self.completion.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.completion.model.clone()));
        }

        if !(1..=50).contains(&self.retrieval.top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        for timeout in [self.loader.timeout_seconds, self.search.timeout_seconds] {
            if !(1..=300).contains(&timeout) {
                return Err(ConfigError::InvalidTimeout(timeout));
            }
        }

        Url::parse(&self.search.endpoint)
            .map_err(|_| ConfigError::InvalidUrl(self.search.endpoint.clone()))?;
        Url::parse(&self.speech.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.speech.base_url.clone()))?;

        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        if self.server.max_body_size < 1024 {
            return Err(ConfigError::InvalidBodySize(self.server.max_body_size));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Get the directory holding the persisted vector index
    #[inline]
    pub fn index_path(&self) -> PathBuf {
        self.get_base_dir().join("index")
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.embedding.ollama_url()
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(8..=4096).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = EmbeddingConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }
}
