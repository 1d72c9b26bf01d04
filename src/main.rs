//! Daemon entry point for gold-price-sync.
//!
//! ```bash
//! # Run with the default config.json next to the binary
//! gold-price-sync
//!
//! # Point at another configuration file
//! gold-price-sync --config /etc/gold-price-sync/config.json
//! ```
//!
//! The process runs until externally terminated; connectivity and data
//! errors are logged and retried, never fatal.

use anyhow::Context;
use clap::Parser;
use gold_price_sync::{Config, SyncEngine};

#[derive(Parser)]
#[command(name = "gold-price-sync")]
#[command(about = "Recalculates gold prices and costs for finalized purchase documents")]
struct Cli {
    /// Path to the JSON configuration file; created with defaults if absent
    #[arg(long, default_value = "config.json", env = "GOLD_PRICE_SYNC_CONFIG")]
    config: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gold_price_sync=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load_or_create(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    SyncEngine::new(config).run().await
}
