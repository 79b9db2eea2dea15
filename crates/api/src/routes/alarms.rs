//! Alarm Routes

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{ApiError, SharedState};
use alerting::{AlarmEvent, AlarmKind, AlarmLimits, AlarmState, AlarmStatus};

/// Query parameters for alarms endpoint
#[derive(Debug, Deserialize)]
pub struct AlarmQuery {
    /// Maximum number of history entries
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for alarms endpoint
#[derive(Debug, Serialize)]
pub struct AlarmResponse {
    /// Latest evaluation per actuator
    pub statuses: Vec<AlarmStatus>,
    pub active: Vec<AlarmState>,
    pub unacknowledged_count: usize,
    /// Newest first
    pub history: Vec<AlarmEvent>,
}

/// Request body for acknowledging an alarm
#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    pub actuator: String,
    pub kind: AlarmKind,
}

/// Get alarm statuses, active alarms and history
pub async fn get_alarms(
    State(state): State<SharedState>,
    Query(params): Query<AlarmQuery>,
) -> Json<AlarmResponse> {
    let state = state.read().await;
    let limit = params.limit.min(1000);

    Json(AlarmResponse {
        statuses: state.alarms.statuses(),
        active: state.alarms.active(),
        unacknowledged_count: state.alarms.pending().len(),
        history: state.alarms.history(limit),
    })
}

/// Get the alarm limits of an actuator
pub async fn get_limits(
    State(state): State<SharedState>,
    Path(ip): Path<String>,
) -> Result<Json<AlarmLimits>, ApiError> {
    let state = state.read().await;
    if !state.monitor.is_known(&ip) {
        return Err(ApiError::NotFound(format!("actuator {}", ip)));
    }
    Ok(Json(state.alarms.limits(&ip)))
}

/// Replace the alarm limits of an actuator
pub async fn put_limits(
    State(state): State<SharedState>,
    Path(ip): Path<String>,
    Json(limits): Json<AlarmLimits>,
) -> Result<Json<AlarmLimits>, ApiError> {
    let mut state = state.write().await;
    if !state.monitor.is_known(&ip) {
        return Err(ApiError::NotFound(format!("actuator {}", ip)));
    }
    state.alarms.set_limits(&ip, limits)?;
    Ok(Json(state.alarms.limits(&ip)))
}

/// Acknowledge an active alarm
pub async fn acknowledge(
    State(state): State<SharedState>,
    Json(request): Json<AcknowledgeRequest>,
) -> Result<Json<AlarmResponse>, ApiError> {
    let mut state = state.write().await;
    if !state.alarms.acknowledge(&request.actuator, request.kind) {
        return Err(ApiError::NotFound(format!(
            "no active {} alarm on {}",
            request.kind.name(),
            request.actuator
        )));
    }

    Ok(Json(AlarmResponse {
        statuses: state.alarms.statuses(),
        active: state.alarms.active(),
        unacknowledged_count: state.alarms.pending().len(),
        history: state.alarms.history(default_limit()),
    }))
}
