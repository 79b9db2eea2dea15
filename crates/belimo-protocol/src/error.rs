//! Belimo Protocol Error Types

use thiserror::Error;
use tokio_modbus::prelude::ExceptionCode;

/// Errors that can occur while talking to an actuator
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Host name or address could not be resolved
    #[error("Cannot resolve actuator address {0}")]
    AddressResolution(String),

    /// TCP connection could not be established
    #[error("Connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    /// Timeout waiting for the actuator
    #[error("Timeout waiting for Modbus response after {0}ms")]
    Timeout(u64),

    /// Transport level failure during a request
    #[error("Transport error: {0}")]
    Transport(String),

    /// Device answered with a Modbus exception
    #[error("Modbus exception from device: {0:?}")]
    Exception(ExceptionCode),

    /// Response did not contain the expected registers
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Setpoint outside the accepted range
    #[error("Valve position {0} is out of range [0, 100]")]
    SetpointOutOfRange(f64),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::Transport(err.to_string())
    }
}

impl From<tokio_modbus::Error> for ProtocolError {
    fn from(err: tokio_modbus::Error) -> Self {
        match err {
            tokio_modbus::Error::Transport(io) => ProtocolError::Transport(io.to_string()),
            other => ProtocolError::InvalidResponse(other.to_string()),
        }
    }
}
