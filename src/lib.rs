//! Home Switchboard library.
//!
//! Switches a fixed set of appliances from a control panel, spoken commands
//! and an MQTT command topic. Every change flows through one
//! [`control::CommandDispatcher`] which commits the state, drives the
//! actuation backend, publishes telemetry and refreshes the panel.

pub mod actuation;
pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod mqtt;
pub mod panel;
pub mod voice;
