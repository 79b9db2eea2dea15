//! Polling Loop Implementation

use crate::control::{MonitorHandle, MonitorState, SchedulerError};
use belimo_protocol::{ActuatorReading, ModbusClient};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Configuration for the poller
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Pause between polling cycles (default: 2 s)
    pub interval: Duration,
    /// Consecutive failures before an actuator is reported unhealthy
    pub max_consecutive_failures: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_consecutive_failures: 3,
        }
    }
}

/// Outcome of polling one actuator
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// Registers were read and scaled
    Reading(ActuatorReading),
    /// The actuator could not be read
    Failure {
        actuator: String,
        timestamp: DateTime<Utc>,
        error: String,
    },
}

impl PollEvent {
    /// Actuator the event refers to
    pub fn actuator(&self) -> &str {
        match self {
            PollEvent::Reading(reading) => &reading.actuator,
            PollEvent::Failure { actuator, .. } => actuator,
        }
    }
}

/// Polling health of one actuator
#[derive(Debug, Clone, Serialize)]
pub struct ActuatorHealth {
    /// Failures since the last successful read
    pub consecutive_failures: u32,
    /// Time of the last successful read
    pub last_success: Option<DateTime<Utc>>,
    /// Message of the most recent failure
    pub last_error: Option<String>,
    /// False once `max_consecutive_failures` is reached
    pub healthy: bool,
}

impl Default for ActuatorHealth {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            last_success: None,
            last_error: None,
            healthy: true,
        }
    }
}

/// Shared view of actuator health, updated by the poller
pub type HealthMap = Arc<RwLock<HashMap<String, ActuatorHealth>>>;

/// Fixed-interval poller over the configured actuators
pub struct Poller {
    /// Clients by actuator id
    clients: HashMap<String, ModbusClient>,
    /// Configuration
    config: PollerConfig,
    /// Control channel
    control: watch::Receiver<MonitorState>,
    /// Per-actuator health
    health: HealthMap,
}

impl Poller {
    /// Create a poller and the handle controlling it.
    ///
    /// The first client is selected by default; monitoring starts stopped.
    pub fn new(
        clients: Vec<ModbusClient>,
        config: PollerConfig,
    ) -> Result<(Self, MonitorHandle), SchedulerError> {
        if clients.is_empty() {
            return Err(SchedulerError::NoActuators);
        }

        let ids: Vec<String> = clients.iter().map(|c| c.actuator().to_string()).collect();
        let (handle, control) = MonitorHandle::new(ids.clone());

        let health = ids
            .iter()
            .map(|id| (id.clone(), ActuatorHealth::default()))
            .collect();

        info!("Poller created with {} actuators", clients.len());

        let poller = Self {
            clients: clients
                .into_iter()
                .map(|c| (c.actuator().to_string(), c))
                .collect(),
            config,
            control,
            health: Arc::new(RwLock::new(health)),
        };
        Ok((poller, handle))
    }

    /// Shared health map, readable while the poller runs
    pub fn health(&self) -> HealthMap {
        self.health.clone()
    }

    /// Run the polling loop.
    ///
    /// Returns when every [`MonitorHandle`] has been dropped or the event
    /// receiver has been closed.
    pub async fn run(mut self, events: mpsc::Sender<PollEvent>) -> Result<(), SchedulerError> {
        info!("Starting poller");

        loop {
            let state = self.control.borrow_and_update().clone();
            if !state.running {
                if self.control.changed().await.is_err() {
                    break;
                }
                continue;
            }

            for actuator in &state.selected {
                if !self.control.borrow().running {
                    break;
                }
                let Some(client) = self.clients.get(actuator) else {
                    continue;
                };

                let event = match client.read_reading().await {
                    Ok(reading) => {
                        self.record_success(actuator, reading.timestamp);
                        PollEvent::Reading(reading)
                    }
                    Err(e) => {
                        let error = e.to_string();
                        self.record_failure(actuator, &error);
                        PollEvent::Failure {
                            actuator: actuator.clone(),
                            timestamp: Utc::now(),
                            error,
                        }
                    }
                };

                if events.send(event).await.is_err() {
                    info!("Event receiver closed, poller stopped");
                    return Ok(());
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                changed = self.control.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Poller stopped");
        Ok(())
    }

    fn record_success(&self, actuator: &str, at: DateTime<Utc>) {
        if let Ok(mut health) = self.health.write() {
            let entry = health.entry(actuator.to_string()).or_default();
            if !entry.healthy {
                info!("Actuator {} recovered", actuator);
            }
            entry.consecutive_failures = 0;
            entry.last_success = Some(at);
            entry.healthy = true;
        }
        debug!("Polled {}", actuator);
    }

    fn record_failure(&self, actuator: &str, error: &str) {
        warn!("Polling {} failed: {}", actuator, error);
        if let Ok(mut health) = self.health.write() {
            let entry = health.entry(actuator.to_string()).or_default();
            entry.consecutive_failures += 1;
            entry.last_error = Some(error.to_string());

            if entry.consecutive_failures >= self.config.max_consecutive_failures && entry.healthy {
                warn!(
                    "Actuator {} unhealthy after {} consecutive failures",
                    actuator, entry.consecutive_failures
                );
                entry.healthy = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use belimo_protocol::sim::SimulatedActuator;
    use belimo_protocol::ActuatorEndpoint;

    fn fast_config() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(50),
            max_consecutive_failures: 2,
        }
    }

    fn dead_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    async fn next_event(rx: &mut mpsc::Receiver<PollEvent>) -> PollEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within timeout")
            .expect("channel closed")
    }

    #[test]
    fn test_poller_requires_actuators() {
        let err = Poller::new(Vec::new(), PollerConfig::default()).err();
        assert_eq!(err, Some(SchedulerError::NoActuators));
    }

    #[tokio::test]
    async fn test_polls_only_while_running() {
        let sim = SimulatedActuator::new();
        let addr = sim.spawn("127.0.0.1:0").await.unwrap();
        let client = ModbusClient::new(ActuatorEndpoint::with_port("127.0.0.1", addr.port()));

        let (poller, handle) = Poller::new(vec![client], fast_config()).unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let task = tokio::spawn(poller.run(tx));

        // Stopped by default
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(rx.try_recv().is_err());

        handle.start();
        match next_event(&mut rx).await {
            PollEvent::Reading(reading) => {
                assert_eq!(reading.actuator, "127.0.0.1");
                assert!((reading.temperature_1 - 22.0).abs() < 1e-9);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        handle.stop();
        tokio::time::sleep(Duration::from_millis(200)).await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());

        drop(handle);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("poller did not exit")
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_health_starts_healthy() {
        let client = ModbusClient::new(ActuatorEndpoint::new("10.0.0.1"));
        let (poller, _handle) = Poller::new(vec![client], fast_config()).unwrap();
        assert!(poller.health().read().unwrap()["10.0.0.1"].healthy);

        // Entries created on first failure stay healthy below the threshold
        poller.record_failure("10.0.0.2", "Timeout");
        let health = poller.health();
        let health = health.read().unwrap();
        let entry = &health["10.0.0.2"];
        assert_eq!(entry.consecutive_failures, 1);
        assert!(entry.healthy);
    }

    #[tokio::test]
    async fn test_exits_when_receiver_dropped() {
        let sim = SimulatedActuator::new();
        let addr = sim.spawn("127.0.0.1:0").await.unwrap();
        let client = ModbusClient::new(ActuatorEndpoint::with_port("127.0.0.1", addr.port()));

        let (poller, handle) = Poller::new(vec![client], fast_config()).unwrap();
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let task = tokio::spawn(poller.run(tx));
        handle.start();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("poller did not exit")
            .unwrap()
            .unwrap();
        // The handle is still alive; the closed receiver ended the loop
        assert!(handle.state().running);
    }

    #[tokio::test]
    async fn test_failure_marks_actuator_unhealthy() {
        let port = dead_port();
        let client = ModbusClient::new(ActuatorEndpoint::with_port("127.0.0.1", port))
            .with_timeout(Duration::from_millis(200));

        let (poller, handle) = Poller::new(vec![client], fast_config()).unwrap();
        let health = poller.health();
        let (tx, mut rx) = mpsc::channel(16);
        tokio::spawn(poller.run(tx));

        handle.start();
        for _ in 0..2 {
            match next_event(&mut rx).await {
                PollEvent::Failure { actuator, .. } => assert_eq!(actuator, "127.0.0.1"),
                other => panic!("unexpected event: {:?}", other),
            }
        }

        let health = health.read().unwrap();
        let entry = &health["127.0.0.1"];
        assert!(entry.consecutive_failures >= 2);
        assert!(!entry.healthy);
        assert!(entry.last_error.is_some());
    }

    #[tokio::test]
    async fn test_failure_does_not_block_other_actuators() {
        let sim = SimulatedActuator::new();
        let addr = sim.spawn("127.0.0.1:0").await.unwrap();
        let good = ModbusClient::new(ActuatorEndpoint::with_port("127.0.0.1", addr.port()));
        let bad = ModbusClient::new(ActuatorEndpoint::with_port("localhost", dead_port()))
            .with_timeout(Duration::from_millis(200));

        let (poller, handle) = Poller::new(vec![bad, good], fast_config()).unwrap();
        handle
            .select(vec!["localhost".to_string(), "127.0.0.1".to_string()])
            .unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        tokio::spawn(poller.run(tx));
        handle.start();

        let first = next_event(&mut rx).await;
        let second = next_event(&mut rx).await;
        assert!(matches!(first, PollEvent::Failure { .. }));
        assert_eq!(first.actuator(), "localhost");
        assert!(matches!(second, PollEvent::Reading(_)));
        assert_eq!(second.actuator(), "127.0.0.1");
    }
}
