//! MQTT integration: telemetry publishing and the remote command topic.

mod client;
mod remote;
mod telemetry;

pub use client::{MqttClient, MqttMessage, MqttSession, connect};
pub use remote::{parse_command_payload, spawn_forwarder};
pub use telemetry::{DisabledTelemetry, MqttTelemetry, TelemetryPublisher, state_payload};
