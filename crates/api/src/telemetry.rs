//! Prometheus metrics names and recorder

use crate::error::ApiError;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const READINGS_TOTAL: &str = "belimo_readings_total";
pub const POLL_FAILURES_TOTAL: &str = "belimo_poll_failures_total";
pub const ALARM_VIOLATIONS_TOTAL: &str = "belimo_alarm_violations_total";
pub const ACTIVE_ALARMS: &str = "belimo_active_alarms";
pub const STORED_READINGS: &str = "belimo_stored_readings";
pub const VALVE_WRITES_TOTAL: &str = "belimo_valve_writes_total";

/// Install the global Prometheus recorder.
///
/// Can only succeed once per process.
pub fn install_recorder() -> Result<PrometheusHandle, ApiError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ApiError::Config(format!("metrics recorder: {}", e)))
}
