//! Motion Stats - Main Entry Point

use anyhow::{anyhow, Context};
use api::{init_logging, run_server, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    init_logging(&config.logging).map_err(|e| anyhow!("failed to initialize logging: {e}"))?;

    info!("=== Motion Stats v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        database = %config.database.url,
        seed = config.seed.enabled,
        "Starting motion statistics service..."
    );

    run_server(config).await
}
