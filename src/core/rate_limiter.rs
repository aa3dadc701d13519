//! Per-provider token-bucket admission control

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::core::errors::{Result, TranslationError};

/// Token bucket state; mutated only under the owning limiter's lock
#[derive(Debug)]
struct TokenBucketState {
    capacity: f64,
    tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucketState {
    /// Lazily refill based on elapsed time since the last refill
    fn refill(&mut self) {
        let now = Instant::now();
        // Instant is monotonic, so elapsed is never negative
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Token-bucket rate limiter shared by all callers of one provider
///
/// Admission decisions are serialized under an internal lock; the lock is
/// never held across a sleep, so waiting callers are cancellable and do not
/// block each other's bookkeeping.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<TokenBucketState>>,
}

impl RateLimiter {
    /// Create a limiter with explicit capacity and refill rate (tokens/sec)
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(TokenBucketState {
                capacity,
                tokens: capacity,
                refill_rate,
                last_refill: Instant::now(),
            })),
        }
    }

    /// Create a limiter allowing bursts up to one second's worth of requests
    pub fn per_second(rate: f64) -> Self {
        Self::new(rate.max(1.0), rate)
    }

    /// Try to consume `n` tokens without waiting
    pub async fn try_acquire(&self, n: u32) -> bool {
        let n = f64::from(n);
        let mut state = self.state.lock().await;
        if n > state.capacity {
            return false;
        }
        state.refill();
        if state.tokens >= n {
            state.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Consume `n` tokens, waiting until enough have accrued
    ///
    /// Requests larger than the bucket capacity can never be satisfied and
    /// are rejected outright.
    pub async fn acquire(&self, n: u32) -> Result<()> {
        let n = f64::from(n);
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                if n > state.capacity {
                    return Err(TranslationError::InvalidRequest {
                        message: format!(
                            "cannot acquire {} tokens from a bucket of capacity {}",
                            n, state.capacity
                        ),
                    });
                }
                state.refill();
                if state.tokens >= n {
                    state.tokens -= n;
                    return Ok(());
                }
                Duration::from_secs_f64((n - state.tokens) / state.refill_rate)
            };

            debug!("Rate limited, waiting {:?} for tokens", wait);
            sleep(wait).await;
        }
    }

    /// Currently available tokens (after a lazy refill)
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        state.refill();
        state.tokens
    }
}
