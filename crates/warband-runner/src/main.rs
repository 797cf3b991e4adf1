//! Headless runner: advances a world at a fixed pace until stopped.

mod driver;
mod telemetry;

use anyhow::{Context, Result};
use driver::Driver;
use tokio::signal;
use tracing::{error, info};
use warband_core::RunnerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_telemetry()?;

    // Optional first argument: path to a JSON runner configuration
    let config = match std::env::args().nth(1) {
        Some(path) => RunnerConfig::from_file(&path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => RunnerConfig::default(),
    };

    info!("Starting warband runner");
    info!(
        grid_size = config.world.grid_size,
        seed = config.world.seed,
        tick_delay_secs = config.world.tick_delay_secs,
        max_ticks = ?config.max_ticks,
        "Runner configured"
    );

    let mut driver = Driver::new(config)?;
    let stats = driver.run(shutdown_signal()).await?;

    info!(
        tick = driver.world().tick(),
        alpha = stats.alpha.population,
        beta = stats.beta.population,
        shelters = stats.total_shelters(),
        "Simulation finished"
    );

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
