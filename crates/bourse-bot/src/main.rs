//! bourse trading engine - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Portfolio ledger and automated trading engine
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via BOURSE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    bourse_telemetry::init_logging()?;

    info!("Starting bourse v{}", env!("CARGO_PKG_VERSION"));

    let config_path = bourse_bot::AppConfig::resolve_path(args.config);
    info!(config_path = %config_path, "Loading configuration");

    let config = bourse_bot::AppConfig::from_file(&config_path)?;
    info!(
        provider = ?config.market_data.provider,
        narration = ?config.strategy.narration,
        instruments = config.instruments.len(),
        agents = config.agents.len(),
        "Configuration loaded"
    );

    let secrets = bourse_bot::Secrets::from_env();
    info!(?secrets, "Secrets loaded");

    let app = bourse_bot::Application::new(config, secrets)?;
    app.run().await?;

    Ok(())
}
