//! Custom error types for translation orchestration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Translation-related errors
///
/// Variants are string-based and `Clone` so a single failed provider call
/// can be fanned out to every text in the affected sub-batch.
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// Credentials rejected by the provider (401/403)
    #[error("authentication failed for provider '{provider}'")]
    AuthenticationError {
        /// Provider name
        provider: String,
    },

    /// Rate limit exceeded (429)
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded {
        /// Suggested wait time from the `Retry-After` header, if present
        retry_after: Option<Duration>,
    },

    /// Provider returned a server error or could not be reached
    #[error("provider unavailable: {message}")]
    ProviderUnavailable {
        /// Description of the failure
        message: String,
    },

    /// The provider does not translate between these languages
    #[error("unsupported language pair: {source_lang} -> {target}")]
    UnsupportedLanguagePair {
        /// Source language code
        source_lang: String,
        /// Target language code
        target: String,
    },

    /// Every candidate provider was tried (or skipped) without success
    #[error("all providers exhausted: {last_error}")]
    AllProvidersExhausted {
        /// Last observed error, or a note that nothing was attempted
        last_error: String,
    },

    /// Malformed request rejected before any provider work
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the request
        message: String,
    },

    /// Request timeout
    #[error("request timeout")]
    TimeoutError,

    /// Network error
    #[error("network error: {message}")]
    NetworkError {
        /// Transport-level failure description
        message: String,
    },

    /// Response did not match the expected wire shape
    #[error("invalid response: {message}")]
    InvalidResponseError {
        /// What failed to parse
        message: String,
    },

    /// Configuration error
    #[error("configuration error: {message}")]
    ConfigError {
        /// Description of the misconfiguration
        message: String,
    },

    /// Internal error
    #[error("internal error: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// Map an HTTP status code to an error variant
    pub fn from_status(
        status: u16,
        provider: &str,
        message: String,
        retry_after: Option<Duration>,
    ) -> Self {
        match status {
            401 | 403 => TranslationError::AuthenticationError {
                provider: provider.to_string(),
            },
            429 => TranslationError::RateLimitExceeded { retry_after },
            400 => TranslationError::InvalidRequest { message },
            500..=599 => TranslationError::ProviderUnavailable {
                message: format!("{} ({})", message, status),
            },
            _ => {
                TranslationError::InternalError(format!("unexpected status {}: {}", status, message))
            }
        }
    }

    /// Whether another attempt against the same provider can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranslationError::RateLimitExceeded { .. }
                | TranslationError::ProviderUnavailable { .. }
                | TranslationError::NetworkError { .. }
                | TranslationError::TimeoutError
        )
    }

    /// Collapse into the coarse kind reported in per-text outcomes
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranslationError::AuthenticationError { .. } => ErrorKind::Authentication,
            TranslationError::RateLimitExceeded { .. } => ErrorKind::RateLimit,
            TranslationError::ProviderUnavailable { .. }
            | TranslationError::NetworkError { .. }
            | TranslationError::TimeoutError => ErrorKind::Unavailable,
            TranslationError::UnsupportedLanguagePair { .. } => ErrorKind::UnsupportedLanguagePair,
            TranslationError::AllProvidersExhausted { .. } => ErrorKind::Exhausted,
            TranslationError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            TranslationError::InvalidResponseError { .. }
            | TranslationError::ConfigError { .. }
            | TranslationError::InternalError(_) => ErrorKind::Internal,
        }
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TranslationError::TimeoutError
        } else {
            // reqwest errors can embed the request URL; strip it so query-string
            // credentials never reach logs
            TranslationError::NetworkError {
                message: err.without_url().to_string(),
            }
        }
    }
}

impl From<anyhow::Error> for TranslationError {
    fn from(err: anyhow::Error) -> Self {
        TranslationError::InternalError(err.to_string())
    }
}

/// Coarse error classification carried in per-text outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials rejected
    Authentication,
    /// Provider-side rate limiting
    RateLimit,
    /// Network, timeout or 5xx failure
    Unavailable,
    /// Language pair not supported by the provider
    UnsupportedLanguagePair,
    /// No provider tier produced a result
    Exhausted,
    /// Caller-side request problem
    InvalidRequest,
    /// Unexpected internal failure
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::UnsupportedLanguagePair => "unsupported_language_pair",
            ErrorKind::Exhausted => "exhausted",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslationError>;
