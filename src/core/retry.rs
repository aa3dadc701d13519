//! Retry policy: error classification and exponential backoff with jitter

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::debug;

use crate::core::errors::{Result, TranslationError};

/// Whether an error is worth retrying against the same provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient; another attempt can succeed
    Retryable,
    /// Retrying the same provider cannot help
    Permanent,
}

/// Backoff shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Base delay in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

/// Retry driver used around every provider sub-batch call
///
/// The attempt counter resets per logical request; once `max_retries` is
/// exceeded the error is handed back to the router, which moves on to the
/// next tier.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    max_retries: u32,
}

impl RetryPolicy {
    /// Create a policy from a backoff shape and per-provider retry budget
    pub fn new(config: RetryConfig, max_retries: u32) -> Self {
        Self {
            config,
            max_retries,
        }
    }

    /// Classify an error as retryable or permanent
    pub fn classify(error: &TranslationError) -> ErrorClass {
        if error.is_retryable() {
            ErrorClass::Retryable
        } else {
            ErrorClass::Permanent
        }
    }

    /// Delay before retry number `attempt` (0-based), with random jitter
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.delay_with_jitter(attempt, rand::thread_rng().gen_range(0.0..1.0))
    }

    /// Delay computation with an explicit jitter factor in `[0, 1)`
    ///
    /// Formula: `min(base * 2^attempt + base * jitter, max)`
    pub fn delay_with_jitter(&self, attempt: u32, jitter_factor: f64) -> Duration {
        let base = self.config.base_delay_ms as f64;
        let max = self.config.max_delay_ms as f64;

        let exponential = base * 2_f64.powi(attempt as i32);
        let jitter = base * jitter_factor.clamp(0.0, 1.0);

        Duration::from_millis((exponential + jitter).min(max) as u64)
    }

    /// Run an operation, retrying transient failures until the budget is spent
    ///
    /// A rate-limit error carrying a `Retry-After` hint overrides the
    /// computed backoff for that attempt (still capped at the maximum).
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("Succeeded after {} retries", attempt);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if Self::classify(&error) == ErrorClass::Permanent || attempt >= self.max_retries
                    {
                        return Err(error);
                    }

                    let delay = match &error {
                        TranslationError::RateLimitExceeded {
                            retry_after: Some(hint),
                        } => (*hint).min(Duration::from_millis(self.config.max_delay_ms)),
                        _ => self.next_delay(attempt),
                    };

                    debug!(
                        "Attempt {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        error,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
