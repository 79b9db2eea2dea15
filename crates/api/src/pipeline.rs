//! Ingest pipeline: poll events into the reading log and alarm state

use crate::telemetry;
use crate::SharedState;
use chrono::{DateTime, Utc};
use poll_scheduler::PollEvent;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// A failed poll as shown to operators
#[derive(Debug, Clone, Serialize)]
pub struct PollWarning {
    pub actuator: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Consume poll events until the poller goes away
pub async fn ingest(state: SharedState, mut events: mpsc::Receiver<PollEvent>) {
    info!("Ingest pipeline started");

    while let Some(event) = events.recv().await {
        let mut state = state.write().await;

        match event {
            PollEvent::Reading(reading) => {
                metrics::counter!(telemetry::READINGS_TOTAL, "actuator" => reading.actuator.clone())
                    .increment(1);

                let status = state.alarms.process(&reading);
                for alarm in &status.alarms {
                    metrics::counter!(
                        telemetry::ALARM_VIOLATIONS_TOTAL,
                        "actuator" => alarm.actuator.clone(),
                        "kind" => alarm.kind.name()
                    )
                    .increment(1);
                }
                metrics::gauge!(telemetry::ACTIVE_ALARMS).set(state.alarms.active().len() as f64);

                if let Err(e) = state.repository.insert(reading) {
                    error!("Failed to store reading: {}", e);
                }
                metrics::gauge!(telemetry::STORED_READINGS).set(state.repository.len() as f64);
            }
            PollEvent::Failure {
                actuator,
                timestamp,
                error,
            } => {
                metrics::counter!(telemetry::POLL_FAILURES_TOTAL, "actuator" => actuator.clone())
                    .increment(1);
                let message = format!("Error reading {}: {}", actuator, error);
                warn!("{}", message);
                state.push_warning(PollWarning {
                    actuator,
                    timestamp,
                    message,
                });
            }
        }
    }

    info!("Ingest pipeline stopped");
}
