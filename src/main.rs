//! Main entry point for the Polyglot Relay CLI

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod core;
mod server;

use cli::commands::Commands;

/// Polyglot Relay - Multi-provider batch translation router
#[derive(Parser, Debug)]
#[command(name = "polyglot-relay", version, about, long_about = None)]
struct Args {
    /// Router configuration file (JSON); defaults to env-based config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }

    // Initialize logging
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}={}", env!("CARGO_PKG_NAME"), log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Execute command
    match args.command {
        Some(Commands::Translate {
            texts,
            file,
            source_lang,
            target_lang,
            timeout_secs,
        }) => {
            cli::commands::handle_translate(
                args.config,
                texts,
                file,
                source_lang,
                target_lang,
                timeout_secs,
            )
            .await?;
        }
        Some(Commands::Server { host, port, debug }) => {
            cli::commands::handle_server(host, port, debug).await?;
        }
        Some(Commands::Providers { validate }) => {
            cli::commands::handle_providers(args.config, validate).await?;
        }
        None => {
            println!("Please specify a command. Use --help for more information.");
        }
    }

    Ok(())
}
