//! Reading Routes

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::MAX_LIVE_WINDOW_SECS;
use crate::{ApiError, SharedState};
use alerting::{AlarmLimits, AlarmStatus};
use belimo_protocol::ActuatorReading;
use storage::ReadingFilter;

const NO_DATA: &str = "No data available.";

/// Query parameters for analysis and filtered export
#[derive(Debug, Default, Deserialize)]
pub struct ReadingQuery {
    /// Local time of day, HH:MM:SS
    pub start: Option<String>,
    /// Local time of day, HH:MM:SS
    pub end: Option<String>,
    /// Comma-separated actuator IPs
    pub actuators: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ReadingQuery {
    /// Parse into a repository filter
    pub fn to_filter(&self) -> Result<ReadingFilter, ApiError> {
        let actuators = self.actuators.as_ref().map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        });

        Ok(ReadingFilter {
            start: parse_time_of_day("start", self.start.as_deref())?,
            end: parse_time_of_day("end", self.end.as_deref())?,
            actuators,
            since: self.since,
            until: self.until,
        })
    }
}

fn parse_time_of_day(field: &str, value: Option<&str>) -> Result<Option<NaiveTime>, ApiError> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveTime::parse_from_str(s, "%H:%M:%S")
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{} must be HH:MM:SS, got '{}'", field, s))),
    }
}

/// Response for the live view
#[derive(Debug, Serialize)]
pub struct LiveResponse {
    pub running: bool,
    pub window_secs: u64,
    pub readings: Vec<ActuatorReading>,
    /// Limits per actuator, drawn as threshold lines
    pub limits: BTreeMap<String, AlarmLimits>,
    pub alarms: Vec<AlarmStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response for analysis queries
#[derive(Debug, Serialize)]
pub struct ReadingsResponse {
    pub count: usize,
    pub readings: Vec<ActuatorReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Readings of the trailing live window
pub async fn get_live(State(state): State<SharedState>) -> Result<Json<LiveResponse>, ApiError> {
    let state = state.read().await;
    let window_secs = state.config.live_window_secs;
    let window = chrono::Duration::seconds(window_secs.min(MAX_LIVE_WINDOW_SECS) as i64);
    let readings = state.repository.recent_window(window)?;

    let limits = state
        .monitor
        .actuators()
        .iter()
        .map(|ip| (ip.clone(), state.alarms.limits(ip)))
        .collect();

    let message = readings.is_empty().then(|| NO_DATA.to_string());
    Ok(Json(LiveResponse {
        running: state.monitor.state().running,
        window_secs,
        readings,
        limits,
        alarms: state.alarms.statuses(),
        message,
    }))
}

/// Logged readings matching a time-of-day and actuator filter
pub async fn get_readings(
    State(state): State<SharedState>,
    Query(query): Query<ReadingQuery>,
) -> Result<Json<ReadingsResponse>, ApiError> {
    let filter = query.to_filter()?;
    let readings = state.read().await.repository.query(&filter)?;

    let message = readings.is_empty().then(|| NO_DATA.to_string());
    Ok(Json(ReadingsResponse {
        count: readings.len(),
        readings,
        message,
    }))
}
