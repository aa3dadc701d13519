//! Fallback router: top-level translation orchestrator
//!
//! Drives the per-text state machine: cache lookup, ordered provider
//! attempts, write-through on success, terminal failure when every tier is
//! exhausted. Each text in a batch advances independently; output order
//! mirrors input order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{timeout, Instant};
use tracing::{debug, info};

use crate::core::cache::{CacheKey, CacheStats, ResultCache};
use crate::core::config::{FallbackConfig, RouterConfig};
use crate::core::errors::{ErrorKind, Result, TranslationError};
use crate::core::matcher::LanguagePreferenceMatcher;
use crate::core::models::{
    AttemptOutcome, AttemptRecord, FallbackAttemptLog, Tier, TranslationOutcome,
    TranslationRequest, TranslationResult,
};
use crate::core::provider::{HttpProviderClient, Provider};

/// Provider name reported for pure cache hits
const CACHE_PROVIDER: &str = "cache";

#[derive(Debug, Default)]
struct ProviderCounters {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

/// Per-provider attempt counters snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStats {
    /// Provider name
    pub name: String,
    /// Provider tier
    pub tier: Tier,
    /// Per-text attempts made against this provider
    pub attempts: u64,
    /// Attempts that produced a translation
    pub successes: u64,
    /// Attempts that failed
    pub failures: u64,
}

/// Router observability snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterStats {
    /// When the snapshot was taken
    pub generated_at: chrono::DateTime<chrono::Utc>,
    /// Result cache statistics
    pub cache: CacheStats,
    /// Per-provider counters, ordered by tier
    pub providers: Vec<ProviderStats>,
}

/// Per-text state while a batch is in flight
struct TextState {
    text: String,
    key: CacheKey,
    resolved: Option<Resolved>,
    from_cache: bool,
    last_error: Option<TranslationError>,
    log: Vec<AttemptRecord>,
}

struct Resolved {
    text: String,
    provider: String,
    tier: Tier,
    cache_hit: bool,
}

impl TextState {
    fn new(text: String, key: CacheKey) -> Self {
        Self {
            text,
            key,
            resolved: None,
            from_cache: false,
            last_error: None,
            log: Vec::new(),
        }
    }
}

/// Top-level translation orchestrator
///
/// Shared across all concurrent callers; the rate limiters live inside the
/// provider clients and the cache is a single shared instance, both for the
/// process lifetime.
pub struct FallbackRouter {
    providers: Vec<Arc<dyn Provider>>,
    cache: Arc<ResultCache>,
    matcher: LanguagePreferenceMatcher,
    fallback: FallbackConfig,
    max_text_len: usize,
    counters: HashMap<String, ProviderCounters>,
}

impl FallbackRouter {
    /// Build a router over explicit provider instances
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        cache: Arc<ResultCache>,
        fallback: FallbackConfig,
        max_text_len: usize,
    ) -> Self {
        let mut providers = providers;
        providers.sort_by_key(|p| p.tier());

        let counters = providers
            .iter()
            .map(|p| (p.name().to_string(), ProviderCounters::default()))
            .collect();

        Self {
            providers,
            cache,
            matcher: LanguagePreferenceMatcher,
            fallback,
            max_text_len,
            counters,
        }
    }

    /// Build a router, cache and provider clients from configuration
    pub fn from_config(config: RouterConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| TranslationError::ConfigError {
                message: e.to_string(),
            })?;

        let cache = Arc::new(ResultCache::new(
            config.cache_capacity,
            config.cache_ttl_secs.map(Duration::from_secs),
        ));

        let mut providers: Vec<Arc<dyn Provider>> = Vec::with_capacity(config.providers.len());
        for provider_config in config.providers_by_tier() {
            let client = HttpProviderClient::new(provider_config.clone(), config.retry.clone())?;
            providers.push(Arc::new(client));
        }

        Ok(Self::new(
            providers,
            cache,
            config.fallback,
            config.max_text_len,
        ))
    }

    /// The configured providers, ordered by tier
    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    /// The shared result cache
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Translate a batch, falling back through provider tiers per text
    ///
    /// Only `InvalidRequest` (malformed input) and `AllProvidersExhausted`
    /// (no provider could even be attempted) escape as errors; per-text
    /// failures are reported inside the outcome.
    pub async fn translate(&self, request: &TranslationRequest) -> Result<TranslationOutcome> {
        request.validate(self.max_text_len)?;

        // Duplicate texts share one state machine and one upstream call
        let mut unique: Vec<TextState> = Vec::new();
        let mut index_of: HashMap<CacheKey, usize> = HashMap::new();
        let mut mapping: Vec<usize> = Vec::with_capacity(request.texts.len());
        for text in &request.texts {
            let key = CacheKey::new(text, &request.source_lang, &request.target_lang);
            let idx = *index_of.entry(key).or_insert_with(|| {
                unique.push(TextState::new(text.clone(), key));
                unique.len() - 1
            });
            mapping.push(idx);
        }

        for state in unique.iter_mut() {
            if let Some(value) = self.cache.get(&state.key).await {
                state.resolved = Some(Resolved {
                    text: value,
                    provider: CACHE_PROVIDER.to_string(),
                    tier: 0,
                    cache_hit: true,
                });
                state.from_cache = true;
            }
        }

        let misses = unique.iter().filter(|s| s.resolved.is_none()).count();
        debug!(
            "Batch of {} texts: {} unique, {} cache misses",
            request.texts.len(),
            unique.len(),
            misses
        );

        if misses > 0 {
            self.run_fallback(request, &mut unique).await?;
        }

        let mut results = Vec::with_capacity(request.texts.len());
        let mut attempt_logs = Vec::with_capacity(request.texts.len());
        for &idx in &mapping {
            let state = &unique[idx];
            results.push(match &state.resolved {
                Some(resolved) => TranslationResult::Translated {
                    text: resolved.text.clone(),
                    provider: resolved.provider.clone(),
                    tier: resolved.tier,
                    cache_hit: resolved.cache_hit,
                },
                None => TranslationResult::Failed {
                    error_kind: state
                        .last_error
                        .as_ref()
                        .map(|e| e.kind())
                        .unwrap_or(ErrorKind::Exhausted),
                },
            });
            attempt_logs.push(FallbackAttemptLog {
                attempts: state.log.clone(),
            });
        }

        let outcome = TranslationOutcome {
            results,
            attempt_logs,
        };
        info!(
            "Batch completed: {} translated, {} failed",
            outcome.translated_count(),
            outcome.failed_count()
        );
        Ok(outcome)
    }

    /// Translate with a caller-initiated deadline for the whole batch
    pub async fn translate_with_timeout(
        &self,
        request: &TranslationRequest,
        deadline: Duration,
    ) -> Result<TranslationOutcome> {
        timeout(deadline, self.translate(request))
            .await
            .map_err(|_| TranslationError::TimeoutError)?
    }

    /// Walk the ordered provider list for every unresolved text
    async fn run_fallback(
        &self,
        request: &TranslationRequest,
        unique: &mut [TextState],
    ) -> Result<()> {
        let ordered = self
            .matcher
            .order_providers(&request.target_lang, &self.providers);

        let any_eligible = ordered.iter().any(|p| {
            p.enabled() && (p.has_credentials() || !self.fallback.skip_on_missing_key)
        });
        if !any_eligible {
            return Err(TranslationError::AllProvidersExhausted {
                last_error: "no enabled provider with a resolvable credential".to_string(),
            });
        }

        for provider in &ordered {
            if !provider.enabled() {
                debug!("Skipping disabled provider '{}'", provider.name());
                continue;
            }
            if !provider.has_credentials() && self.fallback.skip_on_missing_key {
                debug!(
                    "Skipping provider '{}' (no credential configured)",
                    provider.name()
                );
                continue;
            }

            let candidates: Vec<usize> = unique
                .iter()
                .enumerate()
                .filter(|(_, s)| {
                    if s.from_cache {
                        false
                    } else if self.fallback.stop_on_first_success {
                        s.resolved.is_none()
                    } else {
                        true
                    }
                })
                .map(|(i, _)| i)
                .collect();

            if candidates.is_empty() {
                break;
            }

            let texts: Vec<String> = candidates.iter().map(|&i| unique[i].text.clone()).collect();

            let start = Instant::now();
            let results = provider
                .translate(
                    &texts,
                    &request.source_lang,
                    &request.target_lang,
                    request.context_hint.as_deref(),
                )
                .await;
            let latency = start.elapsed();

            let mut failed = 0usize;
            for (&idx, result) in candidates.iter().zip(results) {
                let state = &mut unique[idx];
                self.count(provider.name(), |c| &c.attempts);

                match result {
                    Ok(translated) => {
                        self.count(provider.name(), |c| &c.successes);
                        state.log.push(AttemptRecord {
                            provider: provider.name().to_string(),
                            tier: provider.tier(),
                            outcome: AttemptOutcome::Success,
                            latency,
                        });
                        if state.resolved.is_none() {
                            self.cache.set(state.key, translated.clone()).await;
                            state.resolved = Some(Resolved {
                                text: translated,
                                provider: provider.name().to_string(),
                                tier: provider.tier(),
                                cache_hit: false,
                            });
                        }
                    }
                    Err(error) => {
                        self.count(provider.name(), |c| &c.failures);
                        failed += 1;
                        state.log.push(AttemptRecord {
                            provider: provider.name().to_string(),
                            tier: provider.tier(),
                            outcome: AttemptOutcome::Failed(error.kind()),
                            latency,
                        });
                        state.last_error = Some(error);
                    }
                }
            }

            if failed > 0 && self.fallback.log_fallback_events {
                info!(
                    "Provider '{}' (tier {}) failed {} of {} texts, falling back",
                    provider.name(),
                    provider.tier(),
                    failed,
                    texts.len()
                );
            }
        }

        Ok(())
    }

    /// Read-only observability snapshot
    pub async fn stats(&self) -> RouterStats {
        let providers = self
            .providers
            .iter()
            .map(|p| {
                let (attempts, successes, failures) = self
                    .counters
                    .get(p.name())
                    .map(|c| {
                        (
                            c.attempts.load(Ordering::Relaxed),
                            c.successes.load(Ordering::Relaxed),
                            c.failures.load(Ordering::Relaxed),
                        )
                    })
                    .unwrap_or_default();
                ProviderStats {
                    name: p.name().to_string(),
                    tier: p.tier(),
                    attempts,
                    successes,
                    failures,
                }
            })
            .collect();

        RouterStats {
            generated_at: chrono::Utc::now(),
            cache: self.cache.stats().await,
            providers,
        }
    }

    fn count<F>(&self, provider: &str, field: F)
    where
        F: Fn(&ProviderCounters) -> &AtomicU64,
    {
        if let Some(counters) = self.counters.get(provider) {
            field(counters).fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Behavior {
        Succeed,
        FailRetryable,
        FailPermanent,
        Slow,
    }

    struct MockProvider {
        name: &'static str,
        tier: Tier,
        enabled: bool,
        has_creds: bool,
        preferred: Vec<&'static str>,
        behavior: Behavior,
        calls: AtomicU64,
        texts_seen: Mutex<Vec<String>>,
    }

    impl MockProvider {
        fn new(name: &'static str, tier: Tier, behavior: Behavior) -> Self {
            Self {
                name,
                tier,
                enabled: true,
                has_creds: true,
                preferred: vec![],
                behavior,
                calls: AtomicU64::new(0),
                texts_seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn tier(&self) -> Tier {
            self.tier
        }

        fn enabled(&self) -> bool {
            self.enabled
        }

        fn has_credentials(&self) -> bool {
            self.has_creds
        }

        fn prefers_language(&self, lang: &str) -> bool {
            self.preferred.iter().any(|p| *p == lang)
        }

        fn supported_languages(&self) -> BTreeSet<String> {
            BTreeSet::new()
        }

        async fn validate_credentials(&self) -> Result<bool> {
            Ok(self.has_creds)
        }

        async fn translate(
            &self,
            texts: &[String],
            _source_lang: &str,
            target_lang: &str,
            _context: Option<&str>,
        ) -> Vec<Result<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts_seen
                .lock()
                .unwrap()
                .extend(texts.iter().cloned());

            if self.behavior == Behavior::Slow {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }

            texts
                .iter()
                .map(|text| match self.behavior {
                    Behavior::Succeed | Behavior::Slow => {
                        Ok(format!("{}:{}:{}", self.name, target_lang, text))
                    }
                    Behavior::FailRetryable => Err(TranslationError::ProviderUnavailable {
                        message: "503 upstream".to_string(),
                    }),
                    Behavior::FailPermanent => Err(TranslationError::AuthenticationError {
                        provider: self.name.to_string(),
                    }),
                })
                .collect()
        }
    }

    fn router(providers: Vec<Arc<MockProvider>>) -> FallbackRouter {
        router_with(providers, FallbackConfig::default())
    }

    fn router_with(providers: Vec<Arc<MockProvider>>, fallback: FallbackConfig) -> FallbackRouter {
        let providers: Vec<Arc<dyn Provider>> = providers
            .into_iter()
            .map(|p| p as Arc<dyn Provider>)
            .collect();
        let cache = Arc::new(ResultCache::new(128, None));
        FallbackRouter::new(providers, cache, fallback, 1_000)
    }

    #[tokio::test]
    async fn test_falls_back_to_second_tier() {
        let tier1 = Arc::new(MockProvider::new("flaky", 1, Behavior::FailRetryable));
        let tier2 = Arc::new(MockProvider::new("steady", 2, Behavior::Succeed));
        let tier3 = Arc::new(MockProvider::new("spare", 3, Behavior::Succeed));
        let router = router(vec![tier1.clone(), tier2.clone(), tier3.clone()]);

        let request = TranslationRequest::single("hello", "en", "fi");
        let outcome = router.translate(&request).await.unwrap();

        match &outcome.results[0] {
            TranslationResult::Translated {
                provider,
                tier,
                cache_hit,
                ..
            } => {
                assert_eq!(provider, "steady");
                assert_eq!(*tier, 2);
                assert!(!cache_hit);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(outcome.attempt_logs[0].failures_for("flaky"), 1);
        assert_eq!(outcome.attempt_logs[0].attempts.len(), 2);
        assert_eq!(tier1.calls(), 1);
        assert_eq!(tier2.calls(), 1);
        // Tier 3 is never reached once tier 2 succeeded
        assert_eq!(tier3.calls(), 0);
    }

    #[tokio::test]
    async fn test_preferred_language_promotes_provider() {
        let tier1 = Arc::new(MockProvider::new("azure", 1, Behavior::Succeed));
        let mut finnish = MockProvider::new("deepl", 2, Behavior::Succeed);
        finnish.preferred = vec!["fi"];
        let tier2 = Arc::new(finnish);
        let router = router(vec![tier1.clone(), tier2.clone()]);

        let request = TranslationRequest::single("hello", "en", "fi");
        let outcome = router.translate(&request).await.unwrap();

        match &outcome.results[0] {
            TranslationResult::Translated { provider, .. } => assert_eq!(provider, "deepl"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        // The promoted provider succeeded, so tier 1 was never attempted
        assert_eq!(tier1.calls(), 0);
    }

    #[tokio::test]
    async fn test_identical_texts_make_one_upstream_call() {
        let provider = Arc::new(MockProvider::new("steady", 1, Behavior::Succeed));
        let router = router(vec![provider.clone()]);

        let texts = vec!["same".to_string(); 5];
        let request = TranslationRequest::new(texts, "en", "fi");
        let outcome = router.translate(&request).await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(provider.texts_seen.lock().unwrap().len(), 1);
        assert_eq!(outcome.results.len(), 5);

        let translations: BTreeSet<&str> =
            outcome.results.iter().filter_map(|r| r.text()).collect();
        assert_eq!(translations.len(), 1);

        // A repeat request is served from the cache
        let request = TranslationRequest::single("same", "en", "fi");
        let outcome = router.translate(&request).await.unwrap();
        assert_eq!(provider.calls(), 1);
        match &outcome.results[0] {
            TranslationResult::Translated { cache_hit, .. } => assert!(cache_hit),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_everywhere_is_terminal() {
        let mut a = MockProvider::new("azure", 1, Behavior::Succeed);
        a.has_creds = false;
        let mut b = MockProvider::new("deepl", 2, Behavior::Succeed);
        b.has_creds = false;
        let a = Arc::new(a);
        let b = Arc::new(b);
        let router = router(vec![a.clone(), b.clone()]);

        let request = TranslationRequest::single("hello", "en", "fi");
        let err = router.translate(&request).await.unwrap_err();

        assert!(matches!(err, TranslationError::AllProvidersExhausted { .. }));
        assert_eq!(a.calls(), 0);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_disabled_provider_is_skipped_without_attempt() {
        let mut disabled = MockProvider::new("azure", 1, Behavior::Succeed);
        disabled.enabled = false;
        let disabled = Arc::new(disabled);
        let backup = Arc::new(MockProvider::new("deepl", 2, Behavior::Succeed));
        let router = router(vec![disabled.clone(), backup.clone()]);

        let request = TranslationRequest::single("hello", "en", "fi");
        let outcome = router.translate(&request).await.unwrap();

        assert_eq!(disabled.calls(), 0);
        assert_eq!(outcome.attempt_logs[0].attempts.len(), 1);
        assert_eq!(outcome.attempt_logs[0].attempts[0].provider, "deepl");
    }

    #[tokio::test]
    async fn test_exhausted_batch_reports_last_error_per_text() {
        let tier1 = Arc::new(MockProvider::new("flaky", 1, Behavior::FailRetryable));
        let tier2 = Arc::new(MockProvider::new("locked", 2, Behavior::FailPermanent));
        let router = router(vec![tier1, tier2]);

        let request = TranslationRequest::new(
            vec!["one".to_string(), "two".to_string()],
            "en",
            "fi",
        );
        let outcome = router.translate(&request).await.unwrap();

        assert_eq!(outcome.failed_count(), 2);
        for result in &outcome.results {
            match result {
                TranslationResult::Failed { error_kind } => {
                    assert_eq!(*error_kind, ErrorKind::Authentication);
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_order_preserved_for_mixed_batch() {
        let provider = Arc::new(MockProvider::new("steady", 1, Behavior::Succeed));
        let router = router(vec![provider]);

        let request = TranslationRequest::new(
            vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()],
            "en",
            "sv",
        );
        let outcome = router.translate(&request).await.unwrap();

        let texts: Vec<&str> = outcome.results.iter().filter_map(|r| r.text()).collect();
        assert_eq!(
            texts,
            vec!["steady:sv:alpha", "steady:sv:beta", "steady:sv:alpha"]
        );
    }

    #[tokio::test]
    async fn test_stop_on_first_success_disabled_probes_all_tiers() {
        let tier1 = Arc::new(MockProvider::new("azure", 1, Behavior::Succeed));
        let tier2 = Arc::new(MockProvider::new("deepl", 2, Behavior::Succeed));
        let fallback = FallbackConfig {
            stop_on_first_success: false,
            ..FallbackConfig::default()
        };
        let router = router_with(vec![tier1.clone(), tier2.clone()], fallback);

        let request = TranslationRequest::single("hello", "en", "fi");
        let outcome = router.translate(&request).await.unwrap();

        // Both tiers were probed, but the first success wins
        assert_eq!(tier1.calls(), 1);
        assert_eq!(tier2.calls(), 1);
        match &outcome.results[0] {
            TranslationResult::Translated { provider, .. } => assert_eq!(provider, "azure"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(outcome.attempt_logs[0].attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_batch_timeout_aborts() {
        let provider = Arc::new(MockProvider::new("slow", 1, Behavior::Slow));
        let router = router(vec![provider]);

        let request = TranslationRequest::single("hello", "en", "fi");
        let err = router
            .translate_with_timeout(&request, Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, TranslationError::TimeoutError));
    }

    #[tokio::test]
    async fn test_invalid_request_escapes_before_any_attempt() {
        let provider = Arc::new(MockProvider::new("steady", 1, Behavior::Succeed));
        let router = router(vec![provider.clone()]);

        let request = TranslationRequest::new(vec![], "en", "fi");
        let err = router.translate(&request).await.unwrap_err();

        assert!(matches!(err, TranslationError::InvalidRequest { .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_stats_track_attempts_per_provider() {
        let tier1 = Arc::new(MockProvider::new("flaky", 1, Behavior::FailRetryable));
        let tier2 = Arc::new(MockProvider::new("steady", 2, Behavior::Succeed));
        let router = router(vec![tier1, tier2]);

        let request = TranslationRequest::new(
            vec!["one".to_string(), "two".to_string()],
            "en",
            "fi",
        );
        router.translate(&request).await.unwrap();

        let stats = router.stats().await;
        assert_eq!(stats.providers[0].name, "flaky");
        assert_eq!(stats.providers[0].attempts, 2);
        assert_eq!(stats.providers[0].failures, 2);
        assert_eq!(stats.providers[1].name, "steady");
        assert_eq!(stats.providers[1].successes, 2);
        assert_eq!(stats.cache.misses, 2);
    }
}
