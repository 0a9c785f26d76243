//! Control panel event loop.
//!
//! One task owns the [`Panel`] and processes [`PanelEvent`]s in order. Every
//! surface (buttons, voice worker, remote commands) reaches the dispatcher
//! through this channel, so dispatch and UI refresh always run here.

pub mod console;
pub(crate) mod notifier;

pub use notifier::{UiNotifier, UiSurface, device_label};

use crate::control::{CommandDispatcher, Intent};
use crate::device::Power;
use crate::error::{UnknownDevice, VoiceError};
use crate::voice::{VoiceController, VoiceOutcome};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum PanelEvent {
    /// A device button was pressed: toggle it.
    Button(String),
    /// Explicit on/off request from the panel.
    Set(Intent),
    /// The voice command button was pressed.
    VoiceRequested,
    /// A voice worker finished.
    Voice(VoiceOutcome),
    /// Command received on the MQTT command topic.
    Remote(Intent),
    /// Re-render the current state.
    Status,
    Quit,
}

pub struct Panel {
    dispatcher: Arc<CommandDispatcher>,
    voice: VoiceController,
    events: mpsc::UnboundedReceiver<PanelEvent>,
}

impl Panel {
    pub fn new(
        dispatcher: Arc<CommandDispatcher>,
        voice: VoiceController,
        events: mpsc::UnboundedReceiver<PanelEvent>,
    ) -> Self {
        Self {
            dispatcher,
            voice,
            events,
        }
    }

    /// Render the initial state, then process events until `Quit`, channel
    /// close, or cancellation.
    pub async fn run(mut self, cancel: CancellationToken) {
        self.dispatcher.refresh().await;

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.events.recv() => event,
            };
            let Some(event) = event else { break };
            if !self.handle(event).await {
                break;
            }
        }
        info!("[Panel] Closed");
    }

    /// Process one event. Returns `false` when the panel should close.
    pub async fn handle(&mut self, event: PanelEvent) -> bool {
        match event {
            PanelEvent::Button(name) => {
                let name = self.canonical(&name);
                if let Err(e) = self.dispatcher.toggle(&name).await {
                    self.reject(e);
                }
            }
            PanelEvent::Set(intent) => self.apply(intent, "panel").await,
            PanelEvent::Remote(intent) => self.apply(intent, "remote").await,
            PanelEvent::VoiceRequested => {
                if !self.voice.trigger() {
                    let message = if self.voice.is_disabled() {
                        "Voice control is unavailable"
                    } else {
                        "Already listening"
                    };
                    self.dispatcher.notifier().notice(message);
                }
            }
            PanelEvent::Voice(outcome) => self.voice_result(outcome).await,
            PanelEvent::Status => self.dispatcher.refresh().await,
            PanelEvent::Quit => return false,
        }
        true
    }

    /// Typed and remote names are matched case-insensitively.
    fn canonical(&self, name: &str) -> String {
        self.dispatcher
            .registry()
            .resolve(name)
            .map(str::to_owned)
            .unwrap_or_else(|| name.trim().to_string())
    }

    async fn apply(&self, intent: Intent, source: &str) {
        let device = self.canonical(&intent.device);
        info!("[Panel] {} command: {} {}", source, device, Power::from(intent.on));
        if let Err(e) = self.dispatcher.apply(&device, intent.on).await {
            self.reject(e);
        }
    }

    fn reject(&self, e: UnknownDevice) {
        warn!("[Panel] Rejected command: {}", e);
        self.dispatcher.notifier().notice(&e.to_string());
    }

    async fn voice_result(&mut self, outcome: VoiceOutcome) {
        let notifier = self.dispatcher.notifier().clone();
        match outcome {
            VoiceOutcome::Command { intent, .. } => self.apply(intent, "voice").await,
            VoiceOutcome::NoMatch { heard } => {
                info!("[Voice] No recognizable device + action in: {}", heard);
                notifier.notice("No recognizable device + action found in the command");
            }
            VoiceOutcome::Failed(VoiceError::MicrophoneUnavailable(reason)) => {
                notifier.notice("Microphone unavailable, voice control disabled");
                self.voice.disable(reason);
            }
            VoiceOutcome::Failed(e) => {
                warn!("[Voice] {}", e);
                notifier.notice(&e.to_string());
            }
        }
    }
}
