//! Belimo Actuator Dashboard - Main Entry Point

use api::{init_logging, run, DashboardConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("BELIMO_CONFIG").ok());
    let config = DashboardConfig::load(path.as_deref())?;

    init_logging(&config.log_level, config.log_json)?;

    info!("=== Belimo Actuator Dashboard v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Monitoring {} actuator(s) every {} ms",
        config.actuators.len(),
        config.poll_interval_ms
    );

    run(config).await?;

    Ok(())
}
