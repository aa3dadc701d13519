//! Provider clients behind a common capability seam
//!
//! Concrete providers differ only in auth placement and defaults (captured
//! in [`ProviderConfig`]); the translate/chunk/retry control flow is shared.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::config::{AuthScheme, Credential, ProviderConfig};
use crate::core::errors::{Result, TranslationError};
use crate::core::models::Tier;
use crate::core::rate_limiter::RateLimiter;
use crate::core::retry::{RetryConfig, RetryPolicy};

/// Common capability set implemented by every provider client
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name used in outcomes, logs and stats
    fn name(&self) -> &str;

    /// Priority rank; lower tiers are tried first
    fn tier(&self) -> Tier;

    /// Whether this provider is enabled in configuration
    fn enabled(&self) -> bool;

    /// Whether a credential could be resolved for this provider
    fn has_credentials(&self) -> bool;

    /// Whether the target language is in this provider's preference list
    fn prefers_language(&self, lang: &str) -> bool;

    /// Languages this provider can translate; empty means unrestricted
    fn supported_languages(&self) -> BTreeSet<String>;

    /// Whether the provider can translate between the given languages
    fn supports_pair(&self, source_lang: &str, target_lang: &str) -> bool {
        if source_lang == target_lang {
            return false;
        }
        let languages = self.supported_languages();
        languages.is_empty()
            || (languages.contains(source_lang) && languages.contains(target_lang))
    }

    /// Probe the provider to check whether its credential is accepted
    async fn validate_credentials(&self) -> Result<bool>;

    /// Translate a batch; the returned vector is parallel to `texts`
    async fn translate(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
        context: Option<&str>,
    ) -> Vec<Result<String>>;
}

/// Wire request shared by all provider kinds
#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    source: &'a str,
    target: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<&'a str>,
}

/// Wire response shared by all provider kinds
#[derive(Debug, Deserialize)]
struct WireResponse {
    translations: Vec<WireTranslation>,
}

#[derive(Debug, Deserialize)]
struct WireTranslation {
    translated_text: String,
    #[serde(default)]
    #[allow(dead_code)]
    detected_source_language: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    model: Option<String>,
}

/// HTTP client for one configured provider
///
/// Owns the provider's rate limiter and retry policy; both wrap every
/// sub-batch call.
pub struct HttpProviderClient {
    config: ProviderConfig,
    credential: Option<Credential>,
    http: reqwest::Client,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl HttpProviderClient {
    /// Build a client from provider config and the shared backoff shape
    pub fn new(config: ProviderConfig, retry_config: RetryConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(10)
            .build()?;

        let credential = config.credential.resolve();
        if credential.is_none() {
            debug!(
                "Provider '{}' has no credential in {}",
                config.name,
                config.credential.var_name()
            );
        }

        let limiter = RateLimiter::per_second(config.rate_limit_per_second);
        let retry = RetryPolicy::new(retry_config, config.max_retries);

        Ok(Self {
            config,
            credential,
            http,
            limiter,
            retry,
        })
    }

    /// The provider configuration
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// One HTTP round trip for one sub-batch
    async fn call_once(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
        profile: Option<&str>,
    ) -> Result<Vec<String>> {
        let credential =
            self.credential
                .as_ref()
                .ok_or_else(|| TranslationError::AuthenticationError {
                    provider: self.config.name.clone(),
                })?;

        let body = WireRequest {
            source: source_lang,
            target: target_lang,
            input: texts,
            profile,
        };

        let mut request = self.http.post(&self.config.endpoint);
        request = match self.config.kind.auth_scheme() {
            AuthScheme::QueryParam => request.query(&[("key", credential.expose())]),
            AuthScheme::BearerHeader => {
                request.header("Authorization", format!("Bearer {}", credential.expose()))
            }
        };

        let response = request.json(&body).send().await?;
        let status = response.status();

        if status.is_success() {
            let wire: WireResponse =
                response
                    .json()
                    .await
                    .map_err(|e| TranslationError::InvalidResponseError {
                        message: e.to_string(),
                    })?;

            if wire.translations.len() != texts.len() {
                return Err(TranslationError::InvalidResponseError {
                    message: format!(
                        "expected {} translations, got {}",
                        texts.len(),
                        wire.translations.len()
                    ),
                });
            }

            Ok(wire
                .translations
                .into_iter()
                .map(|t| t.translated_text)
                .collect())
        } else {
            let retry_after = parse_retry_after(response.headers());
            let status_code = status.as_u16();
            let error_text = response.text().await.unwrap_or_default();

            if status_code == 400 && error_text.to_lowercase().contains("language") {
                return Err(TranslationError::UnsupportedLanguagePair {
                    source_lang: source_lang.to_string(),
                    target: target_lang.to_string(),
                });
            }

            Err(TranslationError::from_status(
                status_code,
                &self.config.name,
                error_text,
                retry_after,
            ))
        }
    }

    /// Translate one sub-batch under rate-limit admission and retry
    async fn translate_chunk(
        &self,
        chunk: &[String],
        source_lang: &str,
        target_lang: &str,
        profile: Option<&str>,
    ) -> Result<Vec<String>> {
        self.retry
            .run(|| {
                let this = self;
                async move {
                    this.limiter.acquire(1).await?;
                    this.call_once(chunk, source_lang, target_lang, profile).await
                }
            })
            .await
    }
}

#[async_trait]
impl Provider for HttpProviderClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn tier(&self) -> Tier {
        self.config.tier
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn has_credentials(&self) -> bool {
        self.credential.is_some()
    }

    fn prefers_language(&self, lang: &str) -> bool {
        self.config.preferred_languages.contains(lang)
    }

    fn supported_languages(&self) -> BTreeSet<String> {
        self.config
            .kind
            .supported_languages()
            .iter()
            .map(|l| l.to_string())
            .collect()
    }

    async fn validate_credentials(&self) -> Result<bool> {
        if self.credential.is_none() {
            return Ok(false);
        }

        let probe = vec!["ping".to_string()];
        self.limiter.acquire(1).await?;
        match self.call_once(&probe, "en", "de", None).await {
            Ok(_) => Ok(true),
            Err(TranslationError::AuthenticationError { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn translate(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
        context: Option<&str>,
    ) -> Vec<Result<String>> {
        if texts.is_empty() {
            return vec![];
        }

        if !self.supports_pair(source_lang, target_lang) {
            let err = TranslationError::UnsupportedLanguagePair {
                source_lang: source_lang.to_string(),
                target: target_lang.to_string(),
            };
            return texts.iter().map(|_| Err(err.clone())).collect();
        }

        // A caller-supplied context hint takes precedence over the
        // configured profile
        let profile = context.or(self.config.profile.as_deref());

        let chunks: Vec<&[String]> = texts.chunks(self.config.batch_size).collect();
        let calls = chunks
            .iter()
            .map(|chunk| self.translate_chunk(chunk, source_lang, target_lang, profile));
        let chunk_results = join_all(calls).await;

        let mut results = Vec::with_capacity(texts.len());
        for (chunk, result) in chunks.iter().zip(chunk_results) {
            match result {
                Ok(translations) => results.extend(translations.into_iter().map(Ok)),
                Err(e) => {
                    warn!(
                        "Provider '{}' failed a sub-batch of {}: {}",
                        self.config.name,
                        chunk.len(),
                        e
                    );
                    results.extend(chunk.iter().map(|_| Err(e.clone())));
                }
            }
        }
        results
    }
}

/// Parse a `Retry-After` header given in seconds
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}
