//! Valve Control Routes

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{telemetry, ApiError, SharedState};
use belimo_protocol::block::VALVE_SETPOINT_REGISTER;
use poll_scheduler::ActuatorHealth;

/// Request body for valve writes
#[derive(Debug, Deserialize)]
pub struct WriteValvesRequest {
    /// Valve position in percent by actuator
    pub positions: BTreeMap<String, f64>,
}

/// Outcome of one write
#[derive(Debug, Serialize)]
pub struct WriteResult {
    pub actuator: String,
    pub success: bool,
    /// Raw register value written
    pub value: Option<u16>,
    pub message: String,
}

/// Response for valve writes
#[derive(Debug, Serialize)]
pub struct WriteValvesResponse {
    pub results: Vec<WriteResult>,
}

/// Configured actuator with its polling health
#[derive(Debug, Serialize)]
pub struct ActuatorView {
    pub ip: String,
    pub port: u16,
    pub unit_id: u8,
    pub selected: bool,
    pub health: Option<ActuatorHealth>,
}

/// List configured actuators
pub async fn list_actuators(State(state): State<SharedState>) -> Json<Vec<ActuatorView>> {
    let state = state.read().await;
    let selected = state.monitor.state().selected;
    let health = state.health.read().map(|h| h.clone()).unwrap_or_default();

    let actuators = state
        .config
        .actuators
        .iter()
        .map(|endpoint| ActuatorView {
            ip: endpoint.ip.clone(),
            port: endpoint.port,
            unit_id: endpoint.unit_id,
            selected: selected.contains(&endpoint.ip),
            health: health.get(&endpoint.ip).cloned(),
        })
        .collect();

    Json(actuators)
}

/// Write valve positions to the given actuators.
///
/// The whole request is rejected before anything is sent if an actuator is
/// unknown or a position lies outside 0-100 %.
pub async fn write_valves(
    State(state): State<SharedState>,
    Json(request): Json<WriteValvesRequest>,
) -> Result<Json<WriteValvesResponse>, ApiError> {
    let targets = {
        let state = state.read().await;
        let mut targets = Vec::with_capacity(request.positions.len());
        for (actuator, position) in &request.positions {
            let client = state
                .clients
                .get(actuator)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("actuator {}", actuator)))?;
            if !(0.0..=100.0).contains(position) {
                return Err(ApiError::BadRequest(format!(
                    "valve position {} for {} is outside 0-100",
                    position, actuator
                )));
            }
            targets.push((actuator.clone(), *position, client));
        }
        targets
    };

    let mut results = Vec::with_capacity(targets.len());
    for (actuator, position, client) in targets {
        let result = match client.write_valve_position(position).await {
            Ok(raw) => {
                metrics::counter!(telemetry::VALVE_WRITES_TOTAL, "outcome" => "ok").increment(1);
                WriteResult {
                    message: format!("Successfully written to {}: {}", actuator, raw),
                    actuator,
                    success: true,
                    value: Some(raw),
                }
            }
            Err(e) => {
                metrics::counter!(telemetry::VALVE_WRITES_TOTAL, "outcome" => "error").increment(1);
                WriteResult {
                    message: format!(
                        "Error writing register {} on {}: {}",
                        VALVE_SETPOINT_REGISTER, actuator, e
                    ),
                    actuator,
                    success: false,
                    value: None,
                }
            }
        };
        results.push(result);
    }

    Ok(Json(WriteValvesResponse { results }))
}
