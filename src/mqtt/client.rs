//! MQTT client wrapper shared by telemetry and the remote command surface.

use crate::config::MqttConfig;
use crate::error::TelemetryError;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Delay between reconnect attempts after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Message received from MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

/// MQTT client plus its event loop, before the loop is started.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
    connected: Arc<AtomicBool>,
    command_topic: Option<String>,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self {
            client,
            event_loop,
            connected: Arc::new(AtomicBool::new(false)),
            command_topic: config.command_topic.clone(),
        }
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Flag tracking whether the broker session is currently up.
    pub fn connection_flag(&self) -> Arc<AtomicBool> {
        self.connected.clone()
    }

    /// Run the event loop until cancelled or a disconnect has been sent.
    ///
    /// Re-subscribes to the command topic after every ConnAck and forwards
    /// messages on it to `tx`. `connected_tx` fires on the first ConnAck.
    pub async fn run(
        mut self,
        tx: Option<mpsc::Sender<MqttMessage>>,
        mut connected_tx: Option<oneshot::Sender<()>>,
        cancel: CancellationToken,
    ) {
        info!("[MQTT] Starting event loop");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.event_loop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.connected.store(true, Ordering::SeqCst);
                    info!("[MQTT] Connected");
                    if let Some(topic) = &self.command_topic
                        && let Err(e) = self.client.try_subscribe(topic, QoS::AtMostOnce)
                    {
                        warn!("[MQTT] Failed to subscribe to {}: {:?}", topic, e);
                    }
                    if let Some(signal) = connected_tx.take() {
                        let _ = signal.send(());
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("[MQTT] Invalid UTF-8 in payload: {}", e);
                            continue;
                        }
                    };
                    debug!("[MQTT] Received on {}: {}", publish.topic, payload);

                    if let Some(tx) = &tx {
                        let msg = MqttMessage {
                            topic: publish.topic.clone(),
                            payload,
                        };
                        if tx.send(msg).await.is_err() {
                            error!("[MQTT] Message channel closed");
                            break;
                        }
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!("[MQTT] Disconnect sent");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    self.connected.store(false, Ordering::SeqCst);
                    error!("[MQTT] Connection error: {:?}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        info!("[MQTT] Event loop stopped");
    }
}

/// A started broker session.
pub struct MqttSession {
    pub client: AsyncClient,
    pub connected: Arc<AtomicBool>,
    pub task: JoinHandle<()>,
}

/// Connect once at startup, waiting at most the configured connect timeout.
///
/// On failure the event loop is stopped, so a missing broker never turns
/// into a background retry loop.
pub async fn connect(
    config: &MqttConfig,
    tx: Option<mpsc::Sender<MqttMessage>>,
    cancel: CancellationToken,
) -> Result<MqttSession, TelemetryError> {
    info!(
        "[MQTT] Connecting to {}:{}",
        config.broker_host, config.broker_port
    );

    let mqtt_client = MqttClient::new(config);
    let client = mqtt_client.client();
    let connected = mqtt_client.connection_flag();

    let (connected_tx, connected_rx) = oneshot::channel();
    let loop_cancel = cancel.child_token();
    let task = tokio::spawn({
        let loop_cancel = loop_cancel.clone();
        async move {
            mqtt_client.run(tx, Some(connected_tx), loop_cancel).await;
        }
    });

    match tokio::time::timeout(config.connect_timeout(), connected_rx).await {
        Ok(Ok(())) => Ok(MqttSession {
            client,
            connected,
            task,
        }),
        Ok(Err(_)) => {
            loop_cancel.cancel();
            Err(TelemetryError::Connect("event loop exited".to_string()))
        }
        Err(_) => {
            loop_cancel.cancel();
            Err(TelemetryError::Connect(format!(
                "no ConnAck within {}s",
                config.connect_timeout_secs
            )))
        }
    }
}
