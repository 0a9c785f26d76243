//! Remote command surface: `"<Device> <ON|OFF>"` messages on the command topic.

use super::client::MqttMessage;
use crate::control::Intent;
use crate::device::Power;
use crate::panel::PanelEvent;
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Parse a command payload. The device name is returned as sent; the panel
/// resolves it against the registry.
pub fn parse_command_payload(payload: &str) -> Option<Intent> {
    let (name, state) = payload.trim().rsplit_once(char::is_whitespace)?;
    let power: Power = state.parse().ok()?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(Intent::new(name, power.into()))
}

/// Forward remote commands onto the panel's event channel.
pub fn spawn_forwarder(
    mut rx: mpsc::Receiver<MqttMessage>,
    panel: mpsc::UnboundedSender<PanelEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match parse_command_payload(&msg.payload) {
                Some(intent) => {
                    debug!("[MQTT] Remote command on {}: {}", msg.topic, intent);
                    if panel.send(PanelEvent::Remote(intent)).is_err() {
                        break;
                    }
                }
                None => warn!(
                    "[MQTT] Ignoring malformed command on {}: {:?}",
                    msg.topic, msg.payload
                ),
            }
        }
    })
}
