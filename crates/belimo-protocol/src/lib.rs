//! Belimo Modbus Protocol Implementation
//!
//! This crate provides the holding register map of Belimo valve actuators,
//! the scaling rules that turn raw register words into engineering units,
//! and an async Modbus TCP client for reading telemetry and writing the
//! valve position setpoint.

mod client;
mod error;
mod register;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use client::{ActuatorEndpoint, ModbusClient};
pub use error::ProtocolError;
pub use register::{scale, ActuatorReading, Register};

/// Register block constants
pub mod block {
    /// First holding register of the telemetry block
    pub const START_ADDRESS: u16 = 0;
    /// Number of holding registers read per poll
    pub const REGISTER_COUNT: u16 = 124;
    /// Register receiving the valve position setpoint
    pub const VALVE_SETPOINT_REGISTER: u16 = 0;
}
