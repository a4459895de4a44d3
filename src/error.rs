use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the advisor
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Missing or malformed API credential
    #[error("Credential error: {0}")]
    Credential(String),

    /// Corpus file could not be loaded or is inconsistent
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// Vector index could not be loaded, built or queried
    #[error("Index error: {0}")]
    Index(#[from] crate::index::IndexError),

    /// Embedding model failures
    #[error("Embedding error: {0}")]
    Embedding(#[from] crate::embedding::EmbeddingError),

    /// Generation client could not be constructed
    #[error("Generation client error: {0}")]
    Generation(String),

    /// HTTP service errors
    #[error("Server error: {0}")]
    Server(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for advisor operations
pub type Result<T> = std::result::Result<T, AdvisorError>;
