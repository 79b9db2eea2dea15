//! CSV Export and Metrics Routes

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use super::readings::ReadingQuery;
use crate::{ApiError, SharedState};
use belimo_protocol::ActuatorReading;

fn csv_attachment(readings: &[ActuatorReading], filename: &str) -> Result<Response, ApiError> {
    let body = storage::to_csv(readings)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

/// Every logged reading as CSV
pub async fn export_all(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let readings = state.read().await.repository.all()?;
    csv_attachment(&readings, "all_data.csv")
}

/// Readings matching the analysis filter as CSV
pub async fn export_filtered(
    State(state): State<SharedState>,
    Query(query): Query<ReadingQuery>,
) -> Result<Response, ApiError> {
    let filter = query.to_filter()?;
    let readings = state.read().await.repository.query(&filter)?;
    csv_attachment(&readings, "filtered_data.csv")
}

/// Prometheus metrics
pub async fn metrics(State(state): State<SharedState>) -> Response {
    let state = state.read().await;
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
