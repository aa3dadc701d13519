//! Polyglot Relay - Multi-provider translation router
//!
//! This library orchestrates batch translation across a tiered set of
//! machine-translation providers with per-provider rate limiting, retry
//! with backoff, result caching and transparent fallback.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod core;
pub mod server;

// Re-export key types for convenience
pub use crate::core::{
    cache::{CacheKey, CacheStats, ResultCache},
    config::{CredentialRef, FallbackConfig, ProviderConfig, ProviderKind, RouterConfig},
    errors::{ErrorKind, TranslationError},
    matcher::LanguagePreferenceMatcher,
    models::{TranslationOutcome, TranslationRequest, TranslationResult},
    provider::{HttpProviderClient, Provider},
    rate_limiter::RateLimiter,
    retry::{RetryConfig, RetryPolicy},
    router::{FallbackRouter, RouterStats},
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
