//! Actuator Polling Scheduler
//!
//! Polls the selected actuators at a fixed interval while monitoring is
//! running and forwards readings and failures to a consumer.

mod control;
mod scheduler;

pub use control::{MonitorHandle, MonitorState, SchedulerError};
pub use scheduler::{ActuatorHealth, HealthMap, PollEvent, Poller, PollerConfig};
