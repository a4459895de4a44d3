//! User-facing failure categories

use crate::generation::GenerationError;
use serde::Serialize;

/// What the end user is told when an answer cannot be produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmptyQuery,
    NoRelevantInformation,
    ServiceUnavailable,
    Busy,
    TimedOut,
    Configuration,
    Generic,
}

impl FailureKind {
    /// Category for the error of an exhausted generation loop.
    ///
    /// `saw_auth` wins over the last error: a rejected credential is always
    /// reported as a configuration issue, whichever attempt it happened on.
    pub fn classify(last_error: &GenerationError, saw_auth: bool) -> Self {
        if saw_auth {
            return FailureKind::Configuration;
        }
        match last_error {
            GenerationError::Timeout(_) => FailureKind::TimedOut,
            GenerationError::RateLimited(_) => FailureKind::Busy,
            GenerationError::Auth(_) => FailureKind::Configuration,
            GenerationError::ServiceUnavailable(_) => FailureKind::ServiceUnavailable,
            GenerationError::InvalidRequest(_) | GenerationError::Other(_) => FailureKind::Generic,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::EmptyQuery => {
                "⚠️ Please enter a question about cotton pest and disease management."
            }
            FailureKind::NoRelevantInformation => {
                "⚠️ No relevant information found in the knowledge base. Please try rephrasing your question."
            }
            FailureKind::ServiceUnavailable => {
                "⚠️ The AI service is temporarily unavailable. Our team has been notified. Please try again in a few moments."
            }
            FailureKind::Busy => "⏳ Service is currently busy. Please wait a moment and try again.",
            FailureKind::TimedOut => {
                "⏱️ Request timed out. Please try a shorter question or try again."
            }
            FailureKind::Configuration => "🔑 Service configuration issue. Please contact support.",
            FailureKind::Generic => {
                "❌ Unable to process your request right now. Please try rephrasing your question."
            }
        }
    }
}
