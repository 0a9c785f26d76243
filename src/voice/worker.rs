//! Single-flight voice recognition worker.

use super::backend::VoiceBackend;
use super::parser;
use crate::config::VoiceConfig;
use crate::control::Intent;
use crate::error::VoiceError;
use crate::panel::PanelEvent;
use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Result of one listening attempt, delivered to the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceOutcome {
    /// Understood and mapped to a command.
    Command { heard: String, intent: Intent },
    /// Understood, but no device + action pair was found.
    NoMatch { heard: String },
    Failed(VoiceError),
}

#[derive(Debug, Clone, Copy)]
pub struct VoiceSettings {
    pub listen_timeout: Duration,
    pub phrase_limit: Duration,
    pub calibration: Duration,
}

impl From<&VoiceConfig> for VoiceSettings {
    fn from(config: &VoiceConfig) -> Self {
        Self {
            listen_timeout: config.listen_timeout(),
            phrase_limit: config.phrase_limit(),
            calibration: config.calibration(),
        }
    }
}

/// Calibrate, listen, recognize and parse. Blocks for the whole attempt.
pub fn listen_and_parse(
    backend: &dyn VoiceBackend,
    settings: &VoiceSettings,
    devices: &[String],
) -> VoiceOutcome {
    let heard = backend
        .calibrate(settings.calibration)
        .and_then(|()| backend.listen(settings.listen_timeout, settings.phrase_limit))
        .and_then(|audio| backend.recognize(&audio));

    match heard {
        Ok(text) => {
            let heard = text.to_lowercase();
            info!("[Voice] Heard: {}", heard);
            match parser::parse(&heard, devices.iter().map(String::as_str)) {
                Some(intent) => VoiceOutcome::Command { heard, intent },
                None => VoiceOutcome::NoMatch { heard },
            }
        }
        Err(e) => VoiceOutcome::Failed(e),
    }
}

/// Clears the busy flag when the worker finishes, even on panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Starts recognition workers, at most one at a time.
///
/// Outcomes go back to the panel as [`PanelEvent::Voice`]; the worker never
/// touches device state or the UI itself.
pub struct VoiceController {
    backend: Arc<dyn VoiceBackend>,
    settings: VoiceSettings,
    devices: Arc<[String]>,
    busy: Arc<AtomicBool>,
    disabled: Option<String>,
    events: mpsc::UnboundedSender<PanelEvent>,
}

impl VoiceController {
    pub fn new(
        backend: Arc<dyn VoiceBackend>,
        settings: VoiceSettings,
        devices: impl IntoIterator<Item = String>,
        events: mpsc::UnboundedSender<PanelEvent>,
    ) -> Self {
        Self {
            backend,
            settings,
            devices: devices.into_iter().collect(),
            busy: Arc::new(AtomicBool::new(false)),
            disabled: None,
            events,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.is_some()
    }

    /// Turn voice control off for the rest of the session.
    pub fn disable(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("[Voice] Voice control disabled: {}", reason);
        self.disabled = Some(reason);
    }

    /// Start a listening attempt. Returns `false` if one is already running
    /// or voice control is disabled.
    pub fn trigger(&self) -> bool {
        if let Some(reason) = &self.disabled {
            info!("[Voice] Voice control unavailable: {}", reason);
            return false;
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("[Voice] Already listening, ignoring request");
            return false;
        }

        let guard = BusyGuard(self.busy.clone());
        let backend = self.backend.clone();
        let settings = self.settings;
        let devices = self.devices.clone();
        let events = self.events.clone();

        info!(
            "[Voice] Listening... speak a command like 'turn on {}'",
            devices.first().map(|d| d.to_lowercase()).unwrap_or_default()
        );
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let outcome = listen_and_parse(backend.as_ref(), &settings, &devices);
            if events.send(PanelEvent::Voice(outcome)).is_err() {
                warn!("[Voice] Panel closed before the result arrived");
            }
        });
        true
    }
}
