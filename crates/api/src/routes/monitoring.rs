//! Monitoring Control Routes

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{ApiError, PollWarning, SharedState};
use poll_scheduler::MonitorState;

/// Monitoring state with recent poll failures
#[derive(Debug, Serialize)]
pub struct MonitoringResponse {
    #[serde(flatten)]
    pub state: MonitorState,
    pub actuators: Vec<String>,
    pub warnings: Vec<PollWarning>,
}

/// Request body for changing the polled actuators
#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub actuators: Vec<String>,
}

async fn snapshot(state: &SharedState) -> MonitoringResponse {
    let state = state.read().await;
    MonitoringResponse {
        state: state.monitor.state(),
        actuators: state.monitor.actuators().to_vec(),
        warnings: state.warnings.iter().rev().take(20).cloned().collect(),
    }
}

/// Get monitoring state
pub async fn get_state(State(state): State<SharedState>) -> Json<MonitoringResponse> {
    Json(snapshot(&state).await)
}

/// Start monitoring
pub async fn start(State(state): State<SharedState>) -> Json<MonitoringResponse> {
    state.read().await.monitor.start();
    Json(snapshot(&state).await)
}

/// Stop monitoring
pub async fn stop(State(state): State<SharedState>) -> Json<MonitoringResponse> {
    state.read().await.monitor.stop();
    Json(snapshot(&state).await)
}

/// Replace the set of polled actuators
pub async fn select(
    State(state): State<SharedState>,
    Json(request): Json<SelectionRequest>,
) -> Result<Json<MonitoringResponse>, ApiError> {
    state.read().await.monitor.select(request.actuators)?;
    Ok(Json(snapshot(&state).await))
}
