//! Simulated Belimo actuator
//!
//! A Modbus TCP server exposing the 124 holding registers of a Belimo
//! valve actuator. Register values can be changed while the server runs.

use crate::block::REGISTER_COUNT;
use crate::register::Register;
use std::future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_modbus::prelude::*;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};
use tracing::{debug, error, info};

/// Shared register image of a simulated actuator
#[derive(Debug, Clone)]
pub struct SimulatedActuator {
    registers: Arc<Mutex<Vec<u16>>>,
}

impl SimulatedActuator {
    /// Actuator with in-range default telemetry: T1 22.00 °C, T2 21.50 °C,
    /// delta T 0.50 °C, flow 1152 m^3/h
    pub fn new() -> Self {
        let mut registers = vec![0u16; REGISTER_COUNT as usize];
        registers[Register::FlowSetpoint.address() as usize] = 1200;
        registers[Register::PowerSetpoint.address() as usize] = 250;
        registers[Register::Flow.address() as usize] = 32;
        registers[Register::AbsoluteFlowSetpoint.address() as usize] = 33;
        registers[Register::Temperature1.address() as usize] = 2200;
        registers[Register::Temperature2.address() as usize] = 2150;
        registers[Register::DeltaT.address() as usize] = 50;
        Self {
            registers: Arc::new(Mutex::new(registers)),
        }
    }

    /// Actuator exposing only the first `count` holding registers, as
    /// older firmware does
    pub fn with_register_count(count: usize) -> Self {
        let device = Self::new();
        if let Ok(mut regs) = device.registers.lock() {
            regs.resize(count, 0);
        }
        device
    }

    /// Set a raw register word
    pub fn set_register(&self, address: u16, value: u16) {
        if let Ok(mut regs) = self.registers.lock() {
            if let Some(slot) = regs.get_mut(address as usize) {
                *slot = value;
            }
        }
    }

    /// Get a raw register word
    pub fn register(&self, address: u16) -> Option<u16> {
        self.registers
            .lock()
            .ok()
            .and_then(|regs| regs.get(address as usize).copied())
    }

    /// Bind to `addr` and serve in a background task.
    ///
    /// Returns the bound address, which differs from `addr` when port 0
    /// was requested.
    pub async fn spawn(&self, addr: &str) -> io::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let device = self.clone();

        tokio::spawn(async move {
            if let Err(e) = device.serve(listener).await {
                error!("Simulated actuator stopped: {}", e);
            }
        });

        info!("Simulated actuator listening on {}", local_addr);
        Ok(local_addr)
    }

    /// Serve connections on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        let server = Server::new(listener);
        let on_connected = move |stream, socket_addr| {
            let device = self.clone();
            async move { accept_tcp_connection(stream, socket_addr, move |_| Ok(Some(device.clone()))) }
        };
        let on_process_error = |err| {
            error!("Simulated actuator connection error: {}", err);
        };
        server.serve(&on_connected, on_process_error).await
    }

    fn read(&self, addr: u16, cnt: u16) -> Result<Vec<u16>, ExceptionCode> {
        let regs = self
            .registers
            .lock()
            .map_err(|_| ExceptionCode::ServerDeviceFailure)?;
        let start = addr as usize;
        let end = start + cnt as usize;
        if end > regs.len() {
            return Err(ExceptionCode::IllegalDataAddress);
        }
        Ok(regs[start..end].to_vec())
    }

    fn write(&self, addr: u16, value: u16) -> Result<(), ExceptionCode> {
        // Only the setpoint register is writable on the device
        if addr != crate::block::VALVE_SETPOINT_REGISTER {
            return Err(ExceptionCode::IllegalDataAddress);
        }
        let mut regs = self
            .registers
            .lock()
            .map_err(|_| ExceptionCode::ServerDeviceFailure)?;
        regs[addr as usize] = value;
        Ok(())
    }
}

impl Default for SimulatedActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl tokio_modbus::server::Service for SimulatedActuator {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Simulated actuator request: {:?}", req);
        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => {
                self.read(addr, cnt).map(Response::ReadHoldingRegisters)
            }
            Request::WriteSingleRegister(addr, value) => self
                .write(addr, value)
                .map(|_| Response::WriteSingleRegister(addr, value)),
            _ => Err(ExceptionCode::IllegalFunction),
        };
        future::ready(res)
    }
}
