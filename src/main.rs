use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::info;

use cyclarb::app::Supervisor;
use cyclarb::config::Config;
use cyclarb::domain::solver::HighsSolver;
use cyclarb::{pricing, venue};

/// Multi-venue arbitrage cycle detection engine.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    config.init_logging();
    info!("cyclarb starting");

    let gateways = venue::build_gateways(&config);
    let prices = pricing::build_price_source(&config.pricing)?;
    let solver = Arc::new(HighsSolver::new());

    let supervisor = Supervisor::new(gateways, prices, solver, &config);

    let status = supervisor.start(None).await;
    info!(state = %status.state, "Detection started");

    signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let status = supervisor.stop().await;
    info!(state = %status.state, opportunities = supervisor.history().len(), "cyclarb stopped");

    Ok(())
}
