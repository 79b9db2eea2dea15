//! Repository Implementation

use crate::StorageError;
use belimo_protocol::ActuatorReading;
use chrono::{DateTime, Duration, Local, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, info};

/// Default retention bound of the reading log
pub const DEFAULT_MAX_RECORDS: usize = 1_000_000;

/// Selection of readings for analysis and export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadingFilter {
    /// Earliest local time of day (inclusive), default 00:00:00
    pub start: Option<NaiveTime>,
    /// Latest local time of day (inclusive), default 23:59:59
    pub end: Option<NaiveTime>,
    /// Only these actuators; `None` keeps all
    pub actuators: Option<Vec<String>>,
    /// Absolute lower bound (inclusive)
    pub since: Option<DateTime<Utc>>,
    /// Absolute upper bound (inclusive)
    pub until: Option<DateTime<Utc>>,
}

impl ReadingFilter {
    /// Whether a reading passes the filter.
    ///
    /// A time-of-day range whose start lies after its end wraps past
    /// midnight.
    pub fn matches(&self, reading: &ActuatorReading) -> bool {
        if let Some(actuators) = &self.actuators {
            if !actuators.iter().any(|a| a == &reading.actuator) {
                return false;
            }
        }
        if self.since.is_some_and(|since| reading.timestamp < since) {
            return false;
        }
        if self.until.is_some_and(|until| reading.timestamp > until) {
            return false;
        }

        let start = self.start.unwrap_or(NaiveTime::MIN);
        let end = self
            .end
            .or_else(|| NaiveTime::from_hms_opt(23, 59, 59))
            .unwrap_or(NaiveTime::MIN);
        // Compared at whole-second resolution
        let time = reading.timestamp.with_timezone(&Local).time();
        let time = time.with_nanosecond(0).unwrap_or(time);
        if start <= end {
            start <= time && time <= end
        } else {
            time >= start || time <= end
        }
    }
}

/// In-memory reading log
pub struct Repository {
    /// Readings in arrival order
    readings: Mutex<VecDeque<ActuatorReading>>,
    /// Max retained readings
    max_records: usize,
}

impl Repository {
    /// Create a repository with the default retention bound
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_RECORDS)
    }

    /// Create a repository retaining at most `max_records` readings
    pub fn with_capacity(max_records: usize) -> Self {
        info!("Creating in-memory repository (max {} records)", max_records);
        Self {
            readings: Mutex::new(VecDeque::with_capacity(max_records.min(10_000))),
            max_records: max_records.max(1),
        }
    }

    /// Append a reading, dropping the oldest ones beyond the retention bound
    pub fn insert(&self, reading: ActuatorReading) -> Result<(), StorageError> {
        let mut log = self.lock()?;

        while log.len() >= self.max_records {
            log.pop_front();
        }

        debug!("Stored reading of {} at {}", reading.actuator, reading.timestamp);
        log.push_back(reading);
        Ok(())
    }

    /// Readings no older than `window` before the newest reading in the log.
    ///
    /// A window reaching past the representable time range returns the
    /// whole log.
    pub fn recent_window(&self, window: Duration) -> Result<Vec<ActuatorReading>, StorageError> {
        let log = self.lock()?;

        let Some(newest) = log.iter().map(|r| r.timestamp).max() else {
            return Ok(Vec::new());
        };
        let Some(cutoff) = newest.checked_sub_signed(window) else {
            return Ok(log.iter().cloned().collect());
        };

        Ok(log
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .cloned()
            .collect())
    }

    /// Readings passing `filter`, in arrival order
    pub fn query(&self, filter: &ReadingFilter) -> Result<Vec<ActuatorReading>, StorageError> {
        let log = self.lock()?;
        Ok(log.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    /// Every retained reading, in arrival order
    pub fn all(&self) -> Result<Vec<ActuatorReading>, StorageError> {
        let log = self.lock()?;
        Ok(log.iter().cloned().collect())
    }

    /// Most recent reading of an actuator
    pub fn latest(&self, actuator: &str) -> Result<Option<ActuatorReading>, StorageError> {
        let log = self.lock()?;
        Ok(log.iter().rev().find(|r| r.actuator == actuator).cloned())
    }

    /// Get total reading count
    pub fn len(&self) -> usize {
        self.readings.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retention bound
    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Clear all data
    pub fn clear(&self) {
        if let Ok(mut log) = self.readings.lock() {
            log.clear();
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<ActuatorReading>>, StorageError> {
        self.readings
            .lock()
            .map_err(|e| StorageError::LockError(e.to_string()))
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(actuator: &str, h: u32, m: u32, s: u32) -> ActuatorReading {
        let timestamp = Local
            .with_ymd_and_hms(2026, 1, 15, h, m, s)
            .single()
            .unwrap()
            .with_timezone(&Utc);
        ActuatorReading {
            actuator: actuator.to_string(),
            timestamp,
            valve_position: 0.0,
            flow_setpoint: 0.0,
            power_setpoint: 0.0,
            flow: 1152.0,
            absolute_flow_setpoint: 0.0,
            temperature_1: 22.0,
            temperature_2: 21.5,
            delta_t: 0.5,
        }
    }

    fn time(h: u32, m: u32, s: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, s)
    }

    #[test]
    fn test_insert_and_retrieve() {
        let repo = Repository::new();
        repo.insert(at("10.0.0.1", 12, 0, 0)).unwrap();

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.latest("10.0.0.1").unwrap().unwrap().flow, 1152.0);
        assert!(repo.latest("10.0.0.2").unwrap().is_none());
    }

    #[test]
    fn test_retention_limit() {
        let repo = Repository::with_capacity(5);
        for i in 0..10 {
            repo.insert(at("10.0.0.1", 12, 0, i)).unwrap();
        }

        let all = repo.all().unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].timestamp, at("10.0.0.1", 12, 0, 5).timestamp);
    }

    #[test]
    fn test_recent_window_relative_to_newest() {
        let repo = Repository::new();
        repo.insert(at("10.0.0.1", 12, 0, 0)).unwrap();
        repo.insert(at("10.0.0.1", 12, 0, 5)).unwrap();
        repo.insert(at("10.0.0.2", 12, 0, 10)).unwrap();
        repo.insert(at("10.0.0.1", 12, 0, 15)).unwrap();

        let recent = repo.recent_window(Duration::seconds(10)).unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent.iter().all(|r| r.timestamp >= at("x", 12, 0, 5).timestamp));
    }

    #[test]
    fn test_recent_window_longer_than_time_range() {
        let repo = Repository::new();
        repo.insert(at("10.0.0.1", 12, 0, 0)).unwrap();
        repo.insert(at("10.0.0.1", 12, 0, 5)).unwrap();

        let recent = repo.recent_window(Duration::MAX).unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_recent_window_empty_log() {
        let repo = Repository::new();
        assert!(repo.recent_window(Duration::seconds(10)).unwrap().is_empty());
    }

    #[test]
    fn test_query_time_of_day_and_actuators() {
        let repo = Repository::new();
        repo.insert(at("10.0.0.1", 8, 0, 0)).unwrap();
        repo.insert(at("10.0.0.1", 12, 30, 0)).unwrap();
        repo.insert(at("10.0.0.2", 12, 45, 0)).unwrap();
        repo.insert(at("10.0.0.1", 18, 0, 0)).unwrap();

        let filter = ReadingFilter {
            start: time(12, 0, 0),
            end: time(13, 0, 0),
            actuators: Some(vec!["10.0.0.1".to_string()]),
            ..Default::default()
        };
        let rows = repo.query(&filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, at("10.0.0.1", 12, 30, 0).timestamp);

        // Inclusive bounds
        let filter = ReadingFilter {
            start: time(8, 0, 0),
            end: time(18, 0, 0),
            ..Default::default()
        };
        assert_eq!(repo.query(&filter).unwrap().len(), 4);
    }

    #[test]
    fn test_query_wraps_midnight() {
        let repo = Repository::new();
        repo.insert(at("10.0.0.1", 23, 30, 0)).unwrap();
        repo.insert(at("10.0.0.1", 1, 0, 0)).unwrap();
        repo.insert(at("10.0.0.1", 12, 0, 0)).unwrap();

        let filter = ReadingFilter {
            start: time(22, 0, 0),
            end: time(2, 0, 0),
            ..Default::default()
        };
        assert_eq!(repo.query(&filter).unwrap().len(), 2);
    }

    #[test]
    fn test_default_filter_keeps_everything() {
        let repo = Repository::new();
        repo.insert(at("10.0.0.1", 0, 0, 0)).unwrap();
        repo.insert(at("10.0.0.2", 23, 59, 59)).unwrap();
        assert_eq!(repo.query(&ReadingFilter::default()).unwrap().len(), 2);
    }

    #[test]
    fn test_absolute_bounds() {
        let repo = Repository::new();
        repo.insert(at("10.0.0.1", 10, 0, 0)).unwrap();
        repo.insert(at("10.0.0.1", 11, 0, 0)).unwrap();

        let filter = ReadingFilter {
            since: Some(at("x", 10, 30, 0).timestamp),
            ..Default::default()
        };
        assert_eq!(repo.query(&filter).unwrap().len(), 1);
    }

    proptest! {
        #[test]
        fn prop_log_never_exceeds_capacity(cap in 1usize..20, inserts in 0usize..60) {
            let repo = Repository::with_capacity(cap);
            for i in 0..inserts {
                repo.insert(at("10.0.0.1", 12, 0, (i % 60) as u32)).unwrap();
            }
            prop_assert_eq!(repo.len(), inserts.min(cap));
        }
    }
}
