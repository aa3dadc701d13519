//! Core data models for translation orchestration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{ErrorKind, Result, TranslationError};

/// Provider priority rank; lower tiers are tried first
pub type Tier = u8;

/// A batch translation request
///
/// Order of `texts` is preserved in the outcome; duplicates are allowed and
/// resolved with a single upstream call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    /// Texts to translate, in caller order
    pub texts: Vec<String>,
    /// ISO 639-1 source language code
    pub source_lang: String,
    /// ISO 639-1 target language code
    pub target_lang: String,
    /// Optional domain hint forwarded to providers that accept one
    pub context_hint: Option<String>,
}

impl TranslationRequest {
    /// Create a new batch request
    pub fn new(texts: Vec<String>, source_lang: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            texts,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            context_hint: None,
        }
    }

    /// Convenience constructor for a single text
    pub fn single(text: impl Into<String>, source_lang: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self::new(vec![text.into()], source_lang, target_lang)
    }

    /// Attach a context hint
    pub fn with_context_hint(mut self, hint: impl Into<String>) -> Self {
        self.context_hint = Some(hint.into());
        self
    }

    /// Reject empty batches, empty language codes and oversized texts
    pub fn validate(&self, max_text_len: usize) -> Result<()> {
        if self.texts.is_empty() {
            return Err(TranslationError::InvalidRequest {
                message: "texts must not be empty".to_string(),
            });
        }
        if self.source_lang.is_empty() || self.target_lang.is_empty() {
            return Err(TranslationError::InvalidRequest {
                message: "source_lang and target_lang are required".to_string(),
            });
        }
        for (i, text) in self.texts.iter().enumerate() {
            if text.chars().count() > max_text_len {
                return Err(TranslationError::InvalidRequest {
                    message: format!(
                        "text at index {} exceeds maximum length of {} characters",
                        i, max_text_len
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Outcome for a single text within a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TranslationResult {
    /// Translation succeeded
    Translated {
        /// Translated text
        text: String,
        /// Provider that produced the result (empty for pure cache hits)
        provider: String,
        /// Tier of that provider
        tier: Tier,
        /// Whether the result came from the cache
        cache_hit: bool,
    },
    /// Every tier failed for this text
    Failed {
        /// Classification of the last observed error
        error_kind: ErrorKind,
    },
}

impl TranslationResult {
    /// Whether this text was translated
    pub fn is_translated(&self) -> bool {
        matches!(self, TranslationResult::Translated { .. })
    }

    /// The translated text, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            TranslationResult::Translated { text, .. } => Some(text),
            TranslationResult::Failed { .. } => None,
        }
    }
}

/// Result of one provider attempt for one text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Provider produced a translation
    Success,
    /// Provider failed with the given error kind
    Failed(ErrorKind),
}

/// One entry of a [`FallbackAttemptLog`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Provider name
    pub provider: String,
    /// Provider tier
    pub tier: Tier,
    /// What happened
    pub outcome: AttemptOutcome,
    /// Wall-clock time spent on the attempt
    pub latency: Duration,
}

/// Ordered provider attempts made for one text; immutable once the
/// request completes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackAttemptLog {
    /// Attempts in the order they were made
    pub attempts: Vec<AttemptRecord>,
}

impl FallbackAttemptLog {
    /// Number of failed attempts against the given provider
    pub fn failures_for(&self, provider: &str) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.provider == provider && matches!(a.outcome, AttemptOutcome::Failed(_)))
            .count()
    }
}

/// Batch outcome; `results` and `attempt_logs` are parallel to the
/// request's `texts`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationOutcome {
    /// Per-text results in input order
    pub results: Vec<TranslationResult>,
    /// Per-text fallback attempt logs in input order
    pub attempt_logs: Vec<FallbackAttemptLog>,
}

impl TranslationOutcome {
    /// Number of successfully translated texts
    pub fn translated_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_translated()).count()
    }

    /// Number of failed texts
    pub fn failed_count(&self) -> usize {
        self.results.len() - self.translated_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        let request = TranslationRequest::new(vec!["hello".to_string()], "en", "fi");
        assert!(request.validate(100).is_ok());

        let empty = TranslationRequest::new(vec![], "en", "fi");
        assert!(empty.validate(100).is_err());

        let no_lang = TranslationRequest::new(vec!["hello".to_string()], "", "fi");
        assert!(no_lang.validate(100).is_err());

        let oversized = TranslationRequest::new(vec!["a".repeat(101)], "en", "fi");
        let err = oversized.validate(100).unwrap_err();
        assert!(matches!(err, TranslationError::InvalidRequest { .. }));
    }

    #[test]
    fn test_attempt_log_failure_count() {
        let log = FallbackAttemptLog {
            attempts: vec![
                AttemptRecord {
                    provider: "deepl".to_string(),
                    tier: 1,
                    outcome: AttemptOutcome::Failed(ErrorKind::Unavailable),
                    latency: Duration::from_millis(12),
                },
                AttemptRecord {
                    provider: "google".to_string(),
                    tier: 2,
                    outcome: AttemptOutcome::Success,
                    latency: Duration::from_millis(30),
                },
            ],
        };

        assert_eq!(log.failures_for("deepl"), 1);
        assert_eq!(log.failures_for("google"), 0);
    }

    #[test]
    fn test_outcome_counts() {
        let outcome = TranslationOutcome {
            results: vec![
                TranslationResult::Translated {
                    text: "hei".to_string(),
                    provider: "deepl".to_string(),
                    tier: 1,
                    cache_hit: false,
                },
                TranslationResult::Failed {
                    error_kind: ErrorKind::Exhausted,
                },
            ],
            attempt_logs: vec![FallbackAttemptLog::default(), FallbackAttemptLog::default()],
        };

        assert_eq!(outcome.translated_count(), 1);
        assert_eq!(outcome.failed_count(), 1);
    }
}
