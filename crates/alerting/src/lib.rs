//! Alarm System
//!
//! Provides per-actuator alarm limits, threshold evaluation of readings and
//! alarm state tracking with acknowledgement.

mod limits;
mod manager;

pub use limits::{AlarmKind, AlarmLimits, LimitError};
pub use manager::{evaluate, Alarm, AlarmConfig, AlarmEvent, AlarmManager, AlarmState, AlarmStatus, Transition};
