//! HTTP route handlers

pub mod alarms;
pub mod control;
pub mod export;
pub mod monitoring;
pub mod readings;
