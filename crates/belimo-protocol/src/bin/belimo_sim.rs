//! Simulated Belimo actuator for local testing of the dashboard.
//!
//! Usage: `belimo-sim [bind-address]` (default `127.0.0.1:5020`).
//! The temperatures drift slowly so the live view has something to show.

use belimo_protocol::sim::SimulatedActuator;
use belimo_protocol::Register;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:5020".to_string());

    let sim = SimulatedActuator::new();
    let bound = sim.spawn(&addr).await?;
    info!("Belimo simulator ready on {}", bound);

    let mut tick: u32 = 0;
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick = tick.wrapping_add(1);
                // Triangle wave between 20.00 and 26.00 °C over two minutes
                let phase = (tick % 120) as u16;
                let offset = if phase < 60 { phase } else { 120 - phase };
                let t1 = 2000 + offset * 10;
                let t2 = t1.saturating_sub(50);
                sim.set_register(Register::Temperature1.address(), t1);
                sim.set_register(Register::Temperature2.address(), t2);
                sim.set_register(Register::DeltaT.address(), t1 - t2);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down simulator");
                break;
            }
        }
    }

    Ok(())
}
