//! Monitoring control shared between the poller and its operators

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

/// Scheduler errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// Actuator is not configured
    #[error("Unknown actuator: {0}")]
    UnknownActuator(String),

    /// Poller created without any actuator
    #[error("No actuators configured")]
    NoActuators,
}

/// Desired monitoring state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorState {
    /// Whether the polling loop is active
    pub running: bool,
    /// Actuators polled each cycle, in polling order
    pub selected: Vec<String>,
}

/// Cloneable handle for starting, stopping and steering the poller.
///
/// The polling loop exits once every handle has been dropped.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tx: Arc<watch::Sender<MonitorState>>,
    known: Arc<Vec<String>>,
}

impl MonitorHandle {
    pub(crate) fn new(known: Vec<String>) -> (Self, watch::Receiver<MonitorState>) {
        let initial = MonitorState {
            running: false,
            selected: known.iter().take(1).cloned().collect(),
        };
        let (tx, rx) = watch::channel(initial);
        (
            Self {
                tx: Arc::new(tx),
                known: Arc::new(known),
            },
            rx,
        )
    }

    /// Start polling
    pub fn start(&self) {
        self.tx.send_modify(|state| state.running = true);
        info!("Monitoring started");
    }

    /// Stop polling
    pub fn stop(&self) {
        self.tx.send_modify(|state| state.running = false);
        info!("Monitoring stopped");
    }

    /// Replace the set of polled actuators
    pub fn select(&self, actuators: Vec<String>) -> Result<(), SchedulerError> {
        if let Some(unknown) = actuators.iter().find(|a| !self.known.contains(a)) {
            return Err(SchedulerError::UnknownActuator(unknown.clone()));
        }

        let mut selected: Vec<String> = Vec::with_capacity(actuators.len());
        for actuator in actuators {
            if !selected.contains(&actuator) {
                selected.push(actuator);
            }
        }

        info!("Monitoring selection: {:?}", selected);
        self.tx.send_modify(|state| state.selected = selected);
        Ok(())
    }

    /// Current monitoring state
    pub fn state(&self) -> MonitorState {
        self.tx.borrow().clone()
    }

    /// Configured actuators
    pub fn actuators(&self) -> &[String] {
        &self.known
    }

    /// Whether `actuator` is configured
    pub fn is_known(&self, actuator: &str) -> bool {
        self.known.iter().any(|a| a == actuator)
    }
}
