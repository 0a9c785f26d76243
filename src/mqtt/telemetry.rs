//! Best-effort state announcements.

use crate::device::Power;
use crate::error::TelemetryError;
use async_trait::async_trait;
use log::{info, warn};
use rumqttc::{AsyncClient, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Announces committed state changes on a network channel.
#[async_trait]
pub trait TelemetryPublisher: Send + Sync {
    async fn publish(&self, device: &str, on: bool) -> Result<(), TelemetryError>;

    /// Close the channel at process exit.
    async fn shutdown(&self) {}
}

/// Payload announced for a state change, e.g. `"Light ON"`.
pub fn state_payload(device: &str, on: bool) -> String {
    format!("{} {}", device, Power::from(on))
}

/// Publishes every change to one fixed MQTT topic.
pub struct MqttTelemetry {
    client: AsyncClient,
    topic: String,
    connected: Arc<AtomicBool>,
    timeout: Duration,
}

impl MqttTelemetry {
    pub fn new(
        client: AsyncClient,
        topic: impl Into<String>,
        connected: Arc<AtomicBool>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            topic: topic.into(),
            connected,
            timeout,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl TelemetryPublisher for MqttTelemetry {
    async fn publish(&self, device: &str, on: bool) -> Result<(), TelemetryError> {
        // Offline publishes fail fast instead of piling up in the request queue
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TelemetryError::Disconnected);
        }

        let payload = state_payload(device, on);
        info!("[MQTT] Publishing to {}: {}", self.topic, payload);
        let send = self
            .client
            .publish(&self.topic, QoS::AtMostOnce, false, payload.into_bytes());

        match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result.map_err(TelemetryError::from),
            Err(_) => Err(TelemetryError::Timeout),
        }
    }

    async fn shutdown(&self) {
        match tokio::time::timeout(self.timeout, self.client.disconnect()).await {
            Ok(Ok(())) => info!("[MQTT] Disconnected"),
            Ok(Err(e)) => warn!("[MQTT] Disconnect failed: {:?}", e),
            Err(_) => warn!("[MQTT] Disconnect timed out"),
        }
    }
}

/// Used when MQTT is disabled or the broker was unreachable at startup.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTelemetry;

#[async_trait]
impl TelemetryPublisher for DisabledTelemetry {
    async fn publish(&self, _device: &str, _on: bool) -> Result<(), TelemetryError> {
        Err(TelemetryError::Unavailable)
    }
}
