//! Modbus TCP Client for Belimo Actuators
//!
//! Every operation opens its own connection, performs one request and
//! closes the connection again.

use crate::block::{REGISTER_COUNT, START_ADDRESS, VALVE_SETPOINT_REGISTER};
use crate::error::ProtocolError;
use crate::register::ActuatorReading;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_modbus::client::{tcp, Context};
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

/// Default timeout for Modbus requests
const DEFAULT_TIMEOUT_MS: u64 = 3000;

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

/// Network location of one actuator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorEndpoint {
    /// IP address or host name, also used as the actuator identifier
    pub ip: String,
    /// Modbus TCP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Modbus unit identifier
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
}

impl ActuatorEndpoint {
    /// Endpoint on the standard Modbus port
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port: default_port(),
            unit_id: default_unit_id(),
        }
    }

    /// Endpoint on an explicit port
    pub fn with_port(ip: impl Into<String>, port: u16) -> Self {
        Self {
            port,
            ..Self::new(ip)
        }
    }
}

/// Modbus client bound to a single actuator
#[derive(Debug, Clone)]
pub struct ModbusClient {
    endpoint: ActuatorEndpoint,
    timeout: Duration,
}

impl ModbusClient {
    /// Create a new client for the given endpoint
    pub fn new(endpoint: ActuatorEndpoint) -> Self {
        debug!("Creating Modbus client for {}:{}", endpoint.ip, endpoint.port);
        Self {
            endpoint,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Actuator identifier
    pub fn actuator(&self) -> &str {
        &self.endpoint.ip
    }

    /// Endpoint this client talks to
    pub fn endpoint(&self) -> &ActuatorEndpoint {
        &self.endpoint
    }

    /// Read the complete holding register block
    pub async fn read_registers(&self) -> Result<Vec<u16>, ProtocolError> {
        let mut ctx = self.connect().await?;
        let words = self
            .bounded(ctx.read_holding_registers(START_ADDRESS, REGISTER_COUNT))
            .await?
            .map_err(ProtocolError::from)?
            .map_err(ProtocolError::Exception)?;
        // Dropping the context closes the connection
        drop(ctx);

        if words.len() != REGISTER_COUNT as usize {
            return Err(ProtocolError::InvalidResponse(format!(
                "expected {} registers, got {}",
                REGISTER_COUNT,
                words.len()
            )));
        }

        debug!("Read {} registers from {}", words.len(), self.endpoint.ip);
        Ok(words)
    }

    /// Read the register block and scale it into a reading
    pub async fn read_reading(&self) -> Result<ActuatorReading, ProtocolError> {
        let words = self.read_registers().await?;
        ActuatorReading::from_registers(self.endpoint.ip.clone(), Utc::now(), &words)
    }

    /// Write a valve position setpoint in percent (0-100).
    ///
    /// The device expects hundredths of a percent. Returns the raw word
    /// that was written.
    pub async fn write_valve_position(&self, percent: f64) -> Result<u16, ProtocolError> {
        let raw = setpoint_word(percent)?;
        let mut ctx = self.connect().await?;
        self.bounded(ctx.write_single_register(VALVE_SETPOINT_REGISTER, raw))
            .await?
            .map_err(ProtocolError::from)?
            .map_err(ProtocolError::Exception)?;
        drop(ctx);

        info!("Wrote valve position {} to {}", raw, self.endpoint.ip);
        Ok(raw)
    }

    async fn connect(&self) -> Result<Context, ProtocolError> {
        let addr = self.resolve().await?;
        let ctx = self
            .bounded(tcp::connect_slave(addr, Slave(self.endpoint.unit_id)))
            .await?
            .map_err(|e| {
                warn!("Connection to {} failed: {}", addr, e);
                ProtocolError::Connect {
                    address: addr.to_string(),
                    reason: e.to_string(),
                }
            })?;
        Ok(ctx)
    }

    async fn resolve(&self) -> Result<SocketAddr, ProtocolError> {
        let target = format!("{}:{}", self.endpoint.ip, self.endpoint.port);
        if let Ok(addr) = target.parse::<SocketAddr>() {
            return Ok(addr);
        }

        self.bounded(tokio::net::lookup_host((self.endpoint.ip.as_str(), self.endpoint.port)))
            .await?
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or(ProtocolError::AddressResolution(target))
    }

    async fn bounded<F: Future>(&self, fut: F) -> Result<F::Output, ProtocolError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ProtocolError::Timeout(self.timeout.as_millis() as u64))
    }
}

/// Convert a percentage to the setpoint register word
fn setpoint_word(percent: f64) -> Result<u16, ProtocolError> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(ProtocolError::SetpointOutOfRange(percent));
    }
    Ok((percent * 100.0).round() as u16)
}
