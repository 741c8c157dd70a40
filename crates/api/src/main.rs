//! Engagement Monitoring Server - Main Entry Point

use api::{config::AppConfig, init_logging, install_metrics, run_server};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("=== Engagement Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    let metrics = match install_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus recorder unavailable: {}", e);
            None
        }
    };

    run_server(config, metrics).await
}
