//! Belimo Register Definitions and Scaling
//!
//! Defines the holding registers of interest and the formulas that convert
//! raw register words into engineering units.

use crate::error::ProtocolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Holding registers read from every actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum Register {
    /// Valve position (0)
    ValvePosition = 0,
    /// Flow setpoint (4)
    FlowSetpoint = 4,
    /// Power setpoint (5)
    PowerSetpoint = 5,
    /// Measured volumetric flow (7)
    Flow = 7,
    /// Absolute volumetric flow setpoint (15)
    AbsoluteFlowSetpoint = 15,
    /// Remote (supply) temperature T1 (19)
    Temperature1 = 19,
    /// Sensor (return) temperature T2 (21)
    Temperature2 = 21,
    /// Temperature difference T1 - T2 (23)
    DeltaT = 23,
}

impl Register {
    /// All mapped registers in address order
    pub const ALL: [Register; 8] = [
        Register::ValvePosition,
        Register::FlowSetpoint,
        Register::PowerSetpoint,
        Register::Flow,
        Register::AbsoluteFlowSetpoint,
        Register::Temperature1,
        Register::Temperature2,
        Register::DeltaT,
    ];

    /// Get the holding register address
    pub fn address(&self) -> u16 {
        *self as u16
    }

    /// Look up a mapped register by address
    pub fn from_address(address: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.address() == address)
    }

    /// Human readable label including the unit
    pub fn label(&self) -> &'static str {
        match self {
            Register::ValvePosition => "Valve Position [%]",
            Register::FlowSetpoint => "Flow Setpoint [l/min]",
            Register::PowerSetpoint => "Power Setpoint [kW]",
            Register::Flow => "Flow [m^3/h]",
            Register::AbsoluteFlowSetpoint => "Setpoint Absolute Volumetric Flow [m^3/h]",
            Register::Temperature1 => "Temperature 1 (remote) [°C]",
            Register::Temperature2 => "Temperature 2 (sensor) [°C]",
            Register::DeltaT => "Delta T [°C]",
        }
    }

    /// Convert a raw word of this register to engineering units
    pub fn scale(&self, raw: u16) -> f64 {
        scale(self.address(), raw)
    }
}

/// Scale a raw register word by address.
///
/// Flow registers carry 1/36 m^3/h, setpoints and temperatures carry
/// hundredths. Unmapped addresses are returned unscaled.
pub fn scale(address: u16, raw: u16) -> f64 {
    match address {
        7 | 15 => raw as f64 * 36.0,
        4 | 5 | 19 | 21 | 23 => raw as f64 / 100.0,
        _ => raw as f64,
    }
}

/// One scaled snapshot of an actuator's telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorReading {
    /// Actuator identifier (its IP address)
    pub actuator: String,
    /// When the registers were read
    pub timestamp: DateTime<Utc>,
    /// Valve position, as reported by the device
    pub valve_position: f64,
    /// Flow setpoint (l/min)
    pub flow_setpoint: f64,
    /// Power setpoint (kW)
    pub power_setpoint: f64,
    /// Volumetric flow (m^3/h)
    pub flow: f64,
    /// Absolute volumetric flow setpoint (m^3/h)
    pub absolute_flow_setpoint: f64,
    /// Remote temperature T1 (°C)
    pub temperature_1: f64,
    /// Sensor temperature T2 (°C)
    pub temperature_2: f64,
    /// Delta T (°C)
    pub delta_t: f64,
}

impl ActuatorReading {
    /// Build a reading from a raw register block starting at address 0
    pub fn from_registers(
        actuator: impl Into<String>,
        timestamp: DateTime<Utc>,
        words: &[u16],
    ) -> Result<Self, ProtocolError> {
        let required = Register::DeltaT.address() as usize + 1;
        if words.len() < required {
            return Err(ProtocolError::InvalidResponse(format!(
                "expected at least {} registers, got {}",
                required,
                words.len()
            )));
        }

        let word = |r: Register| r.scale(words[r.address() as usize]);
        Ok(Self {
            actuator: actuator.into(),
            timestamp,
            valve_position: word(Register::ValvePosition),
            flow_setpoint: word(Register::FlowSetpoint),
            power_setpoint: word(Register::PowerSetpoint),
            flow: word(Register::Flow),
            absolute_flow_setpoint: word(Register::AbsoluteFlowSetpoint),
            temperature_1: word(Register::Temperature1),
            temperature_2: word(Register::Temperature2),
            delta_t: word(Register::DeltaT),
        })
    }

    /// Get the scaled value of a register
    pub fn value(&self, register: Register) -> f64 {
        match register {
            Register::ValvePosition => self.valve_position,
            Register::FlowSetpoint => self.flow_setpoint,
            Register::PowerSetpoint => self.power_setpoint,
            Register::Flow => self.flow,
            Register::AbsoluteFlowSetpoint => self.absolute_flow_setpoint,
            Register::Temperature1 => self.temperature_1,
            Register::Temperature2 => self.temperature_2,
            Register::DeltaT => self.delta_t,
        }
    }
}
