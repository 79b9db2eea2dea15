//! Alarm Manager Implementation

use crate::limits::{AlarmKind, AlarmLimits, LimitError};
use belimo_protocol::ActuatorReading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, info, warn};

/// Alarm manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    /// Limits applied to actuators without their own limits
    pub default_limits: AlarmLimits,
    /// Maximum number of retained alarm transitions
    pub history_capacity: usize,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            default_limits: AlarmLimits::default(),
            history_capacity: 1000,
        }
    }
}

/// One limit violation found in a reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alarm {
    pub actuator: String,
    pub kind: AlarmKind,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Result of evaluating the latest reading of an actuator
#[derive(Debug, Clone, Serialize)]
pub struct AlarmStatus {
    pub actuator: String,
    pub timestamp: DateTime<Utc>,
    pub alarms: Vec<Alarm>,
    /// Operator facing summary, one line per alarm or an all-clear line
    pub messages: Vec<String>,
}

impl AlarmStatus {
    /// Whether every value was within limits
    pub fn all_clear(&self) -> bool {
        self.alarms.is_empty()
    }
}

/// Alarm state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Raised,
    Cleared,
    Acknowledged,
}

/// Entry in the alarm history
#[derive(Debug, Clone, Serialize)]
pub struct AlarmEvent {
    pub actuator: String,
    pub kind: AlarmKind,
    pub transition: Transition,
    pub value: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// State of an active alarm
#[derive(Debug, Clone, Serialize)]
pub struct AlarmState {
    pub actuator: String,
    pub kind: AlarmKind,
    /// When the alarm was raised
    pub since: DateTime<Utc>,
    /// Most recent out-of-range value
    pub last_value: f64,
    /// Consecutive readings out of range
    pub occurrences: usize,
    /// Whether an operator acknowledged the alarm
    pub acknowledged: bool,
}

/// Check a reading against limits.
///
/// Quantities are checked in the order T1, T2, ΔT, Flow.
pub fn evaluate(limits: &AlarmLimits, reading: &ActuatorReading) -> Vec<Alarm> {
    AlarmKind::ALL
        .iter()
        .filter_map(|&kind| {
            let value = reading.value(kind.register());
            if limits.contains(kind, value) {
                return None;
            }
            let (min, max) = limits.bounds(kind);
            Some(Alarm {
                actuator: reading.actuator.clone(),
                kind,
                value,
                min,
                max,
                timestamp: reading.timestamp,
                message: format!(
                    "[{}] {} out of range: {:.2} {}",
                    reading.actuator,
                    kind.name(),
                    value,
                    kind.unit()
                ),
            })
        })
        .collect()
}

/// Alarm manager holding limits and alarm state per actuator
pub struct AlarmManager {
    /// Configuration
    config: AlarmConfig,
    /// Limits by actuator
    limits: HashMap<String, AlarmLimits>,
    /// Latest evaluation by actuator
    latest: BTreeMap<String, AlarmStatus>,
    /// Active alarms by actuator and quantity
    active: BTreeMap<(String, AlarmKind), AlarmState>,
    /// Raise, clear and acknowledge transitions, oldest first
    history: VecDeque<AlarmEvent>,
}

impl AlarmManager {
    /// Create a new alarm manager
    pub fn new(config: AlarmConfig) -> Self {
        info!("Creating alarm manager with config: {:?}", config);
        Self {
            config,
            limits: HashMap::new(),
            latest: BTreeMap::new(),
            active: BTreeMap::new(),
            history: VecDeque::new(),
        }
    }

    /// Limits in force for an actuator
    pub fn limits(&self, actuator: &str) -> AlarmLimits {
        self.limits
            .get(actuator)
            .copied()
            .unwrap_or(self.config.default_limits)
    }

    /// Replace the limits of an actuator after validating them
    pub fn set_limits(&mut self, actuator: &str, limits: AlarmLimits) -> Result<(), LimitError> {
        limits.validate()?;
        info!("Alarm limits for {} set to {:?}", actuator, limits);
        self.limits.insert(actuator.to_string(), limits);
        Ok(())
    }

    /// Evaluate a reading, update alarm state and return the status
    pub fn process(&mut self, reading: &ActuatorReading) -> AlarmStatus {
        let alarms = evaluate(&self.limits(&reading.actuator), reading);

        for kind in AlarmKind::ALL {
            let key = (reading.actuator.clone(), kind);
            let violation = alarms.iter().find(|a| a.kind == kind);

            match (violation, self.active.contains_key(&key)) {
                (Some(alarm), true) => {
                    if let Some(state) = self.active.get_mut(&key) {
                        state.last_value = alarm.value;
                        state.occurrences += 1;
                    }
                }
                (Some(alarm), false) => {
                    warn!("{}", alarm.message);
                    self.active.insert(
                        key,
                        AlarmState {
                            actuator: reading.actuator.clone(),
                            kind,
                            since: reading.timestamp,
                            last_value: alarm.value,
                            occurrences: 1,
                            acknowledged: false,
                        },
                    );
                    self.push_history(&reading.actuator, kind, Transition::Raised, Some(alarm.value), reading.timestamp);
                }
                (None, true) => {
                    self.active.remove(&key);
                    let value = reading.value(kind.register());
                    info!("[{}] {} back within limits: {:.2} {}", reading.actuator, kind.name(), value, kind.unit());
                    self.push_history(&reading.actuator, kind, Transition::Cleared, Some(value), reading.timestamp);
                }
                (None, false) => {}
            }
        }

        let messages = if alarms.is_empty() {
            debug!("{}: all values within limits", reading.actuator);
            vec![format!("{}: all values within limits", reading.actuator)]
        } else {
            alarms.iter().map(|a| a.message.clone()).collect()
        };

        let status = AlarmStatus {
            actuator: reading.actuator.clone(),
            timestamp: reading.timestamp,
            alarms,
            messages,
        };
        self.latest.insert(reading.actuator.clone(), status.clone());
        status
    }

    /// Acknowledge an active alarm
    pub fn acknowledge(&mut self, actuator: &str, kind: AlarmKind) -> bool {
        let Some(state) = self.active.get_mut(&(actuator.to_string(), kind)) else {
            return false;
        };
        if state.acknowledged {
            return true;
        }
        state.acknowledged = true;
        info!("Alarm acknowledged: [{}] {}", actuator, kind.name());
        self.push_history(actuator, kind, Transition::Acknowledged, None, Utc::now());
        true
    }

    /// Latest status of an actuator
    pub fn status(&self, actuator: &str) -> Option<&AlarmStatus> {
        self.latest.get(actuator)
    }

    /// Latest status of every evaluated actuator, ordered by actuator
    pub fn statuses(&self) -> Vec<AlarmStatus> {
        self.latest.values().cloned().collect()
    }

    /// Active alarms, ordered by actuator and quantity
    pub fn active(&self) -> Vec<AlarmState> {
        self.active.values().cloned().collect()
    }

    /// Unacknowledged active alarms
    pub fn pending(&self) -> Vec<AlarmState> {
        self.active
            .values()
            .filter(|state| !state.acknowledged)
            .cloned()
            .collect()
    }

    /// Most recent transitions, newest first
    pub fn history(&self, limit: usize) -> Vec<AlarmEvent> {
        self.history.iter().rev().take(limit).cloned().collect()
    }

    /// Clear all alarm state and history
    pub fn clear(&mut self) {
        self.latest.clear();
        self.active.clear();
        self.history.clear();
    }

    fn push_history(
        &mut self,
        actuator: &str,
        kind: AlarmKind,
        transition: Transition,
        value: Option<f64>,
        timestamp: DateTime<Utc>,
    ) {
        while self.history.len() >= self.config.history_capacity.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(AlarmEvent {
            actuator: actuator.to_string(),
            kind,
            transition,
            value,
            timestamp,
        });
    }
}

impl Default for AlarmManager {
    fn default() -> Self {
        Self::new(AlarmConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(t1: f64, t2: f64, dt: f64, flow: f64) -> ActuatorReading {
        ActuatorReading {
            actuator: "192.168.0.11".to_string(),
            timestamp: Utc::now(),
            valve_position: 0.0,
            flow_setpoint: 0.0,
            power_setpoint: 0.0,
            flow,
            absolute_flow_setpoint: 0.0,
            temperature_1: t1,
            temperature_2: t2,
            delta_t: dt,
        }
    }

    #[test]
    fn test_all_clear() {
        let mut manager = AlarmManager::default();
        let status = manager.process(&reading(22.0, 21.5, 0.5, 1152.0));
        assert!(status.all_clear());
        assert_eq!(status.messages, vec!["192.168.0.11: all values within limits"]);
    }

    #[test]
    fn test_violations_in_order() {
        let alarms = evaluate(&AlarmLimits::default(), &reading(26.0, 19.0, 5.5, 900.0));
        let kinds: Vec<_> = alarms.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AlarmKind::Temperature1,
                AlarmKind::Temperature2,
                AlarmKind::DeltaT,
                AlarmKind::Flow
            ]
        );
        assert_eq!(alarms[0].message, "[192.168.0.11] T1 out of range: 26.00 °C");
        assert_eq!(alarms[3].message, "[192.168.0.11] Flow out of range: 900.00 m^3/h");
    }

    #[test]
    fn test_boundary_values_do_not_alarm() {
        let alarms = evaluate(&AlarmLimits::default(), &reading(25.0, 20.0, 0.0, 1300.0));
        assert!(alarms.is_empty());
    }

    #[test]
    fn test_raise_and_clear_transitions() {
        let mut manager = AlarmManager::default();
        manager.process(&reading(30.0, 21.0, 1.0, 1100.0));
        manager.process(&reading(31.0, 21.0, 1.0, 1100.0));

        let active = manager.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, AlarmKind::Temperature1);
        assert_eq!(active[0].occurrences, 2);
        assert_eq!(active[0].last_value, 31.0);

        manager.process(&reading(22.0, 21.0, 1.0, 1100.0));
        assert!(manager.active().is_empty());

        let history = manager.history(10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].transition, Transition::Cleared);
        assert_eq!(history[1].transition, Transition::Raised);
    }

    #[test]
    fn test_per_actuator_limits() {
        let mut manager = AlarmManager::default();
        let limits = AlarmLimits {
            flow_min: 0.0,
            flow_max: 2000.0,
            ..Default::default()
        };
        manager.set_limits("192.168.0.11", limits).unwrap();

        let status = manager.process(&reading(22.0, 21.0, 1.0, 1900.0));
        assert!(status.all_clear());
        assert_eq!(manager.limits("10.0.0.1"), AlarmLimits::default());
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let mut manager = AlarmManager::default();
        let limits = AlarmLimits {
            t1_min: 2.0,
            ..Default::default()
        };
        assert!(manager.set_limits("192.168.0.11", limits).is_err());
        assert_eq!(manager.limits("192.168.0.11"), AlarmLimits::default());
    }

    #[test]
    fn test_acknowledgement() {
        let mut manager = AlarmManager::default();
        manager.process(&reading(22.0, 21.0, 1.0, 500.0));

        assert_eq!(manager.pending().len(), 1);
        assert!(manager.acknowledge("192.168.0.11", AlarmKind::Flow));
        assert!(manager.pending().is_empty());
        assert_eq!(manager.active().len(), 1);
        assert!(!manager.acknowledge("192.168.0.11", AlarmKind::DeltaT));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut manager = AlarmManager::new(AlarmConfig {
            history_capacity: 3,
            ..Default::default()
        });
        for _ in 0..5 {
            manager.process(&reading(30.0, 21.0, 1.0, 1100.0));
            manager.process(&reading(22.0, 21.0, 1.0, 1100.0));
        }
        assert_eq!(manager.history(100).len(), 3);
    }
}
