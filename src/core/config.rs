//! Configuration management

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::models::Tier;
use crate::core::retry::RetryConfig;

/// Wire-protocol variant of a provider
///
/// Variants differ only in auth placement, default endpoint, default batch
/// size, default timeout and cost profile; the orchestration control flow
/// is identical for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Enterprise MT (bearer-key auth, large batches)
    Azure,
    /// European-focused MT (bearer-key auth, curated language set)
    DeepL,
    /// Broad-coverage MT (API key as query parameter)
    Google,
    /// Large-language-model fallback (OAuth2-style bearer token)
    OpenAi,
}

/// Where the provider expects its credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `?key=...` query parameter
    QueryParam,
    /// `Authorization: Bearer ...` header
    BearerHeader,
}

impl ProviderKind {
    /// Default endpoint for this provider kind
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ProviderKind::Azure => "https://api.cognitive.microsofttranslator.com/translate",
            ProviderKind::DeepL => "https://api.deepl.com/v2/translate",
            ProviderKind::Google => "https://translation.googleapis.com/language/translate/v2",
            ProviderKind::OpenAi => "https://api.openai.com/v1/translations",
        }
    }

    /// Default number of texts per upstream call
    pub fn default_batch_size(&self) -> usize {
        match self {
            ProviderKind::Azure => 100,
            ProviderKind::DeepL => 50,
            ProviderKind::Google => 128,
            // LLM calls are slow and per-token billed; keep batches small
            ProviderKind::OpenAi => 16,
        }
    }

    /// Default request timeout in milliseconds
    pub fn default_timeout_ms(&self) -> u64 {
        match self {
            ProviderKind::OpenAi => 60_000,
            _ => 30_000,
        }
    }

    /// Default sustained request rate (requests/second)
    pub fn default_rate_limit(&self) -> f64 {
        match self {
            ProviderKind::Azure => 10.0,
            ProviderKind::DeepL => 5.0,
            ProviderKind::Google => 20.0,
            ProviderKind::OpenAi => 2.0,
        }
    }

    /// Auth placement for this kind
    pub fn auth_scheme(&self) -> AuthScheme {
        match self {
            ProviderKind::Google => AuthScheme::QueryParam,
            _ => AuthScheme::BearerHeader,
        }
    }

    /// Languages this kind can translate; empty means unrestricted
    pub fn supported_languages(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::DeepL => &[
                "bg", "cs", "da", "de", "el", "en", "es", "et", "fi", "fr", "hu", "id", "it",
                "ja", "ko", "lt", "lv", "nb", "nl", "pl", "pt", "ro", "ru", "sk", "sl", "sv",
                "tr", "uk", "zh",
            ],
            _ => &[],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Azure => write!(f, "azure"),
            ProviderKind::DeepL => write!(f, "deepl"),
            ProviderKind::Google => write!(f, "google"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

/// Reference to a credential by environment variable name
///
/// Configs carry only the variable name; the secret itself is resolved at
/// client construction time and never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialRef {
    env: String,
}

impl CredentialRef {
    /// Reference a credential held in the named environment variable
    pub fn env(var: impl Into<String>) -> Self {
        Self { env: var.into() }
    }

    /// The environment variable name
    pub fn var_name(&self) -> &str {
        &self.env
    }

    /// Resolve the secret from the environment
    pub fn resolve(&self) -> Option<Credential> {
        std::env::var(&self.env)
            .ok()
            .filter(|v| !v.is_empty())
            .map(Credential)
    }
}

/// A resolved secret; redacted in all formatting output
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Access the secret for request signing
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

/// Configuration for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name used in outcomes, logs and stats
    pub name: String,
    /// Wire-protocol variant
    pub kind: ProviderKind,
    /// Priority rank; lower tiers are tried first
    pub tier: Tier,
    /// Disabled providers are skipped without counting as failures
    pub enabled: bool,
    /// Endpoint URL
    pub endpoint: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Retry attempts per sub-batch before falling through to the next tier
    pub max_retries: u32,
    /// Maximum texts per upstream call
    pub batch_size: usize,
    /// Sustained request rate (requests/second)
    pub rate_limit_per_second: f64,
    /// Target languages this provider should be promoted for
    #[serde(default)]
    pub preferred_languages: BTreeSet<String>,
    /// Optional provider profile (e.g. formality setting or model name)
    #[serde(default)]
    pub profile: Option<String>,
    /// Credential reference; only the env var name is ever serialized
    pub credential: CredentialRef,
}

impl ProviderConfig {
    /// Build a provider config from kind defaults
    pub fn for_kind(
        name: impl Into<String>,
        kind: ProviderKind,
        tier: Tier,
        credential_env: &str,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            tier,
            enabled: true,
            endpoint: kind.default_endpoint().to_string(),
            timeout_ms: kind.default_timeout_ms(),
            max_retries: 3,
            batch_size: kind.default_batch_size(),
            rate_limit_per_second: kind.default_rate_limit(),
            preferred_languages: BTreeSet::new(),
            profile: None,
            credential: CredentialRef::env(credential_env),
        }
    }

    /// Validate this provider's settings
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("provider name is required");
        }
        if self.endpoint.is_empty() {
            anyhow::bail!("provider '{}': endpoint is required", self.name);
        }
        if self.batch_size == 0 {
            anyhow::bail!("provider '{}': batch_size must be greater than 0", self.name);
        }
        if self.rate_limit_per_second <= 0.0 {
            anyhow::bail!(
                "provider '{}': rate_limit_per_second must be greater than 0",
                self.name
            );
        }
        if self.timeout_ms == 0 {
            anyhow::bail!("provider '{}': timeout_ms must be greater than 0", self.name);
        }
        Ok(())
    }
}

/// Fallback behavior switches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Skip providers whose credential env var is unset
    #[serde(default = "default_true")]
    pub skip_on_missing_key: bool,
    /// Stop probing further tiers for a text once one provider succeeded
    #[serde(default = "default_true")]
    pub stop_on_first_success: bool,
    /// Emit an info-level event on every tier switch
    #[serde(default = "default_true")]
    pub log_fallback_events: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            skip_on_missing_key: true,
            stop_on_first_success: true,
            log_fallback_events: true,
        }
    }
}

/// Default provider stack: (name, kind, tier, credential env var)
const DEFAULT_PROVIDERS: &[(&str, ProviderKind, Tier, &str)] = &[
    ("azure", ProviderKind::Azure, 1, "AZURE_TRANSLATOR_KEY"),
    ("deepl", ProviderKind::DeepL, 2, "DEEPL_API_KEY"),
    ("google", ProviderKind::Google, 3, "GOOGLE_TRANSLATE_API_KEY"),
    ("openai", ProviderKind::OpenAi, 4, "OPENAI_API_KEY"),
];

/// Top-level configuration for the fallback router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Configured providers in any order; the router sorts by tier
    pub providers: Vec<ProviderConfig>,
    /// Fallback behavior
    #[serde(default)]
    pub fallback: FallbackConfig,
    /// Result cache capacity (entries)
    pub cache_capacity: usize,
    /// Result cache TTL in seconds; `None` disables expiry
    pub cache_ttl_secs: Option<u64>,
    /// Maximum length of a single text, in characters
    pub max_text_len: usize,
    /// Backoff shape shared by all providers
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            providers: vec![],
            fallback: FallbackConfig::default(),
            cache_capacity: 10_000,
            cache_ttl_secs: Some(86_400),
            max_text_len: 5_000,
            retry: RetryConfig::default(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let cache_capacity = std::env::var("CACHE_CAPACITY")
            .unwrap_or_else(|_| "10000".to_string())
            .parse::<usize>()?;

        let cache_ttl_secs = match std::env::var("CACHE_TTL_SECS") {
            Ok(v) if v == "0" => None,
            Ok(v) => Some(v.parse::<u64>()?),
            Err(_) => Some(86_400),
        };

        let max_text_len = std::env::var("MAX_TEXT_LEN")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<usize>()?;

        let retry = RetryConfig {
            base_delay_ms: std::env::var("RETRY_BASE_DELAY_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse::<u64>()?,
            max_delay_ms: std::env::var("RETRY_MAX_DELAY_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse::<u64>()?,
        };

        let fallback = FallbackConfig {
            skip_on_missing_key: env_flag("FALLBACK_SKIP_ON_MISSING_KEY", true)?,
            stop_on_first_success: env_flag("FALLBACK_STOP_ON_FIRST_SUCCESS", true)?,
            log_fallback_events: env_flag("FALLBACK_LOG_EVENTS", true)?,
        };

        Ok(Self {
            providers: vec![],
            fallback,
            cache_capacity,
            cache_ttl_secs,
            max_text_len,
            retry,
        })
    }

    /// Load configuration with the default provider stack
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::from_env()?;

        if config.providers.is_empty() {
            config.providers = DEFAULT_PROVIDERS
                .iter()
                .map(|(name, kind, tier, env)| ProviderConfig::for_kind(*name, *kind, *tier, env))
                .collect();

            info!("Loaded {} default providers", config.providers.len());
        }

        Ok(config)
    }

    /// Load from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            warn!("No providers configured");
        }

        for provider in &self.providers {
            provider.validate()?;
        }

        let mut tiers: Vec<Tier> = self.providers.iter().map(|p| p.tier).collect();
        tiers.sort_unstable();
        tiers.dedup();
        if tiers.len() != self.providers.len() {
            warn!("Duplicate provider tiers configured; ties resolve in config order");
        }

        if self.cache_capacity == 0 {
            anyhow::bail!("cache_capacity must be greater than 0");
        }
        if self.max_text_len == 0 {
            anyhow::bail!("max_text_len must be greater than 0");
        }

        Ok(())
    }

    /// Providers sorted by ascending tier
    pub fn providers_by_tier(&self) -> Vec<&ProviderConfig> {
        let mut providers: Vec<&ProviderConfig> = self.providers.iter().collect();
        providers.sort_by_key(|p| p.tier);
        providers
    }

    /// Find a provider by name
    pub fn find_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}

fn env_flag(var: &str, default: bool) -> anyhow::Result<bool> {
    match std::env::var(var) {
        Ok(v) => match v.as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(anyhow::anyhow!("{}: unrecognized boolean '{}'", var, other)),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_providers_cover_all_tiers() {
        let config = RouterConfig::load().unwrap();
        assert_eq!(config.providers.len(), 4);

        let ordered = config.providers_by_tier();
        assert_eq!(ordered[0].name, "azure");
        assert_eq!(ordered[3].name, "openai");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_validation() {
        let mut provider =
            ProviderConfig::for_kind("deepl", ProviderKind::DeepL, 1, "DEEPL_API_KEY");
        assert!(provider.validate().is_ok());

        provider.rate_limit_per_second = 0.0;
        assert!(provider.validate().is_err());

        provider.rate_limit_per_second = 5.0;
        provider.batch_size = 0;
        assert!(provider.validate().is_err());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.json");

        let mut config = RouterConfig::default();
        config.providers =
            vec![ProviderConfig::for_kind("deepl", ProviderKind::DeepL, 1, "DEEPL_API_KEY")];
        config.to_file(&path).unwrap();

        let loaded = RouterConfig::from_file(&path).unwrap();
        assert_eq!(loaded.providers.len(), 1);
        assert_eq!(loaded.providers[0].name, "deepl");
        assert_eq!(loaded.providers[0].credential.var_name(), "DEEPL_API_KEY");
    }

    #[test]
    fn test_credential_is_redacted() {
        std::env::set_var("TEST_REDACTED_KEY", "super-secret");
        let credential = CredentialRef::env("TEST_REDACTED_KEY").resolve().unwrap();

        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert_eq!(format!("{}", credential), "***");
        assert_eq!(credential.expose(), "super-secret");
    }

    #[test]
    fn test_config_serialization_omits_secrets() {
        std::env::set_var("TEST_SERIALIZED_KEY", "super-secret");
        let provider =
            ProviderConfig::for_kind("deepl", ProviderKind::DeepL, 1, "TEST_SERIALIZED_KEY");

        let json = serde_json::to_string(&provider).unwrap();
        assert!(json.contains("TEST_SERIALIZED_KEY"));
        assert!(!json.contains("super-secret"));
    }

    #[test]
    fn test_deepl_language_set_contains_finnish() {
        assert!(ProviderKind::DeepL.supported_languages().contains(&"fi"));
        assert!(ProviderKind::Google.supported_languages().is_empty());
    }
}
