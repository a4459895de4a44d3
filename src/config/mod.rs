//! Configuration management for the advisor
//!
//! Loaded from TOML, then environment overrides are applied, then the whole
//! configuration is validated in one pass.

use crate::error::{AdvisorError, Result};
use crate::index::{HnswParams, IndexKind};
use crate::pipeline::{PipelineSettings, RetryPolicy};
use crate::prompt::PromptBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub corpus: CorpusConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub server: ServerConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Startup inputs produced by the ingestion step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub chunks_file: PathBuf,
    pub index_file: PathBuf,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub kind: IndexKind,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
}

/// Retrieval and source-listing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub sources_limit: usize,
    pub excerpt_chars: usize,
}

/// Prompt template configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub assistant_role: String,
    pub source_document: String,
    pub history_turns: usize,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub api_key_env: String,
    pub key_prefix: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Generation retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub min_answer_chars: usize,
}

/// HTTP service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AdvisorError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| AdvisorError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Defaults with environment overrides, validated
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| AdvisorError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: COTTON_SECTION__KEY=value,
    /// plus ALLOWED_ORIGINS as a comma-separated origin list
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("COTTON_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }

        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS") {
            self.server.allowed_origins = parse_origins(&origins);
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "CORPUS__CHUNKS_FILE" => self.corpus.chunks_file = PathBuf::from(value),
            "CORPUS__INDEX_FILE" => self.corpus.index_file = PathBuf::from(value),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "INDEX__KIND" => {
                self.index.kind = match value {
                    "flat" => IndexKind::Flat,
                    "hnsw" => IndexKind::Hnsw,
                    _ => {
                        return Err(AdvisorError::InvalidConfigValue {
                            path: path.to_string(),
                            message: format!("Unknown index kind '{}'", value),
                        })
                    }
                }
            }
            "RETRIEVAL__TOP_K" => self.retrieval.top_k = parse_env(path, value)?,
            "LLM__MODEL" => self.llm.model = value.to_string(),
            "LLM__API_KEY_ENV" => self.llm.api_key_env = value.to_string(),
            "LLM__BASE_URL" => self.llm.base_url = value.to_string(),
            "LLM__TEMPERATURE" => self.llm.temperature = parse_env(path, value)?,
            "LLM__TIMEOUT_SECS" => self.llm.timeout_secs = parse_env(path, value)?,
            "RETRY__MAX_ATTEMPTS" => self.retry.max_attempts = parse_env(path, value)?,
            "RETRY__BASE_DELAY_MS" => self.retry.base_delay_ms = parse_env(path, value)?,
            "SERVER__BIND" => self.server.bind = value.to_string(),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AdvisorError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("cotton-advisor").join("config.toml"))
    }

    pub fn hnsw_params(&self) -> HnswParams {
        HnswParams {
            m: self.index.hnsw_m,
            ef_construction: self.index.hnsw_ef_construction,
            ef_search: self.index.hnsw_ef_search,
        }
    }

    pub fn prompt_builder(&self) -> PromptBuilder {
        PromptBuilder::new(
            self.prompt.assistant_role.clone(),
            self.prompt.source_document.clone(),
            self.prompt.history_turns,
        )
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            top_k: self.retrieval.top_k,
            sources_limit: self.retrieval.sources_limit,
            excerpt_chars: self.retrieval.excerpt_chars,
            min_answer_chars: self.retry.min_answer_chars,
            retry: RetryPolicy::new(
                self.retry.max_attempts,
                Duration::from_millis(self.retry.base_delay_ms),
            ),
        }
    }
}

fn parse_env<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| AdvisorError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            corpus: CorpusConfig {
                chunks_file: PathBuf::from("chunks.json"),
                index_file: PathBuf::from("index.json"),
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                batch_size: 32,
            },
            index: IndexConfig {
                kind: IndexKind::Flat,
                hnsw_m: 16,
                hnsw_ef_construction: 200,
                hnsw_ef_search: 64,
            },
            retrieval: RetrievalConfig {
                top_k: 5,
                sources_limit: 3,
                excerpt_chars: 200,
            },
            prompt: PromptConfig {
                assistant_role: "Cotton Pest and Disease Management expert assistant".to_string(),
                source_document: "ICAR-CICR Advisory document".to_string(),
                history_turns: 3,
            },
            llm: LlmConfig {
                provider: "gemini".to_string(),
                api_key_env: "GEMINI_API_KEY".to_string(),
                key_prefix: "AIza".to_string(),
                model: "gemini-2.5-flash".to_string(),
                base_url: crate::generation::DEFAULT_BASE_URL.to_string(),
                temperature: 0.2,
                timeout_secs: 60,
            },
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1000,
                min_answer_chars: 10,
            },
            server: ServerConfig {
                bind: "0.0.0.0:8000".to_string(),
                allowed_origins: vec!["*".to_string()],
            },
        }
    }
}
