//! CLI command definitions and handlers

use clap::Subcommand;
use std::path::{Path, PathBuf};

/// Commands for the translation router
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate texts through the provider fallback chain
    Translate {
        /// Texts to translate
        texts: Vec<String>,

        /// Read texts from a file, one per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Source language (ISO 639-1)
        #[arg(long, default_value = "en")]
        source_lang: String,

        /// Target language (ISO 639-1)
        #[arg(short, long)]
        target_lang: String,

        /// Abort the whole batch after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Start HTTP API server
    Server {
        /// Bind address (default: 0.0.0.0)
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Listen port (default: 8000)
        #[arg(short, long, default_value_t = 8000)]
        port: u16,

        /// Enable debug mode
        #[arg(long)]
        debug: bool,
    },

    /// List configured providers and their credential status
    Providers {
        /// Probe each provider to verify its credential is accepted
        #[arg(long)]
        validate: bool,
    },
}

/// Load router configuration from a file or the environment
fn load_config(path: Option<&Path>) -> anyhow::Result<crate::core::config::RouterConfig> {
    use crate::core::config::RouterConfig;

    match path {
        Some(path) => {
            let config = RouterConfig::from_file(path)?;
            config.validate()?;
            Ok(config)
        }
        None => RouterConfig::load(),
    }
}

/// Handle translate command
pub async fn handle_translate(
    config_path: Option<PathBuf>,
    texts: Vec<String>,
    file: Option<PathBuf>,
    source_lang: String,
    target_lang: String,
    timeout_secs: Option<u64>,
) -> anyhow::Result<()> {
    use crate::core::models::{TranslationRequest, TranslationResult};
    use crate::core::router::FallbackRouter;
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::{Duration, Instant};
    use tracing::info;

    let start_time = Instant::now();

    let texts = match file {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect()
        }
        None => texts,
    };

    if texts.is_empty() {
        anyhow::bail!("No texts to translate; pass them as arguments or via --file");
    }

    info!("Starting translation of {} texts", texts.len());
    info!("Language pair: {} -> {}", source_lang, target_lang);

    let config = load_config(config_path.as_deref())?;
    let router = FallbackRouter::from_config(config)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.set_message(format!("Translating {} texts...", texts.len()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let request = TranslationRequest::new(texts, source_lang, target_lang);
    let outcome = match timeout_secs {
        Some(secs) => {
            router
                .translate_with_timeout(&request, Duration::from_secs(secs))
                .await?
        }
        None => router.translate(&request).await?,
    };

    spinner.finish_and_clear();

    for (text, result) in request.texts.iter().zip(&outcome.results) {
        match result {
            TranslationResult::Translated {
                text: translated,
                provider,
                cache_hit,
                ..
            } => {
                let origin = if *cache_hit { "cache" } else { provider.as_str() };
                println!("{}  ->  {}  [{}]", text, translated, origin);
            }
            TranslationResult::Failed { error_kind } => {
                eprintln!("{}  ->  FAILED ({})", text, error_kind);
            }
        }
    }

    let duration = start_time.elapsed();
    info!(
        "Completed: {} translated, {} failed in {:?}",
        outcome.translated_count(),
        outcome.failed_count(),
        duration
    );

    println!("\n✅ Translation completed!");
    println!("   Translated: {}", outcome.translated_count());
    println!("   Failed: {}", outcome.failed_count());
    println!("   Time: {:?}", duration);

    Ok(())
}

/// Handle server command
pub async fn handle_server(host: String, port: u16, debug: bool) -> anyhow::Result<()> {
    use crate::server::api::run_server;
    use tracing::info;

    if debug {
        std::env::set_var("RUST_LOG", "debug");
    }

    info!("Starting HTTP server on {}:{}", host, port);
    println!("🚀 Server starting on http://{}:{}", host, port);
    println!("   POST /translate - batch translation");
    println!("   GET  /stats     - cache and provider statistics");

    run_server(host, port).await?;

    Ok(())
}

/// Handle providers command
pub async fn handle_providers(
    config_path: Option<PathBuf>,
    validate: bool,
) -> anyhow::Result<()> {
    use crate::core::provider::{HttpProviderClient, Provider};

    let config = load_config(config_path.as_deref())?;

    println!(
        "{:<10} {:<8} {:<5} {:<9} {:<12} credential",
        "name", "kind", "tier", "enabled", "rate/s"
    );

    for provider_config in config.providers_by_tier() {
        let has_key = provider_config.credential.resolve().is_some();
        let key_status = if has_key {
            "set".to_string()
        } else {
            format!("missing ({})", provider_config.credential.var_name())
        };

        println!(
            "{:<10} {:<8} {:<5} {:<9} {:<12} {}",
            provider_config.name,
            provider_config.kind.to_string(),
            provider_config.tier,
            provider_config.enabled,
            provider_config.rate_limit_per_second,
            key_status
        );

        if validate && has_key {
            let client =
                HttpProviderClient::new(provider_config.clone(), config.retry.clone())?;
            match client.validate_credentials().await {
                Ok(true) => println!("           ✅ credential accepted"),
                Ok(false) => println!("           ⚠️  credential rejected"),
                Err(e) => println!("           ⚠️  validation failed: {}", e),
            }
        }
    }

    Ok(())
}
