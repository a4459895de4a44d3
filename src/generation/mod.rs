//! Answer synthesis through a hosted LLM
//!
//! The client makes exactly one request per call and reports failures as a
//! tagged [`GenerationError`]; retry policy lives in the answer pipeline.

mod gemini;

pub use gemini::{GeminiClient, DEFAULT_BASE_URL};

use async_trait::async_trait;
use thiserror::Error;

/// Failure of a single generation request, classified by the client
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// The request or the upstream service timed out
    #[error("Generation timed out: {0}")]
    Timeout(String),

    /// Rate limit or quota exhausted
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Credential rejected or missing permissions
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Service or model unreachable, unknown, or failing server-side
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The service refused the request as malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Anything else, including unusable responses
    #[error("Generation failed: {0}")]
    Other(String),
}

impl GenerationError {
    /// Whether repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            GenerationError::Auth(_) | GenerationError::InvalidRequest(_)
        )
    }
}

/// Text generation backend
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate a completion for `prompt`
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Model identifier used for every request
    fn model_name(&self) -> &str;
}

/// An API key that passed format validation
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    /// Trim `raw` and require it to be non-empty and to start with `prefix`
    pub fn parse(raw: &str, prefix: &str) -> Result<Self, String> {
        let key = raw.trim();
        if key.is_empty() {
            return Err("API key is empty".to_string());
        }
        if !key.starts_with(prefix) {
            return Err(format!(
                "Invalid API key format: expected prefix '{}'",
                prefix
            ));
        }
        Ok(Self(key.to_string()))
    }

    /// Read and validate the key from environment variable `env_var`
    pub fn from_env(env_var: &str, prefix: &str) -> Result<Self, String> {
        let raw = std::env::var(env_var)
            .map_err(|_| format!("{} not found in environment variables", env_var))?;
        Self::parse(&raw, prefix)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(****)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_trimmed() {
        let key = ApiKey::parse("  AIzaSyExample \n", "AIza").unwrap();
        assert_eq!(key.expose(), "AIzaSyExample");
    }

    #[test]
    fn test_api_key_rejections() {
        assert!(ApiKey::parse("   ", "AIza").is_err());
        assert!(ApiKey::parse("sk-not-gemini", "AIza").is_err());
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::parse("AIzaSecret", "AIza").unwrap();
        assert!(!format!("{:?}", key).contains("Secret"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(GenerationError::Timeout("t".into()).is_transient());
        assert!(GenerationError::RateLimited("r".into()).is_transient());
        assert!(GenerationError::ServiceUnavailable("s".into()).is_transient());
        assert!(GenerationError::Other("o".into()).is_transient());
        assert!(!GenerationError::Auth("a".into()).is_transient());
        assert!(!GenerationError::InvalidRequest("i".into()).is_transient());
    }
}
