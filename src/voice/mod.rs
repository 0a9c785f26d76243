//! Voice control: blocking capture and recognition on a worker, intent
//! parsing, and delivery of the outcome to the panel.

mod backend;
mod parser;
mod worker;

pub use backend::{AudioBuffer, CommandVoice, DisabledVoice, VoiceBackend};
pub use parser::parse;
pub use worker::{VoiceController, VoiceOutcome, VoiceSettings, listen_and_parse};

use crate::config::VoiceConfig;
use std::sync::Arc;

/// Pick the voice backend for this session.
pub fn select_backend(config: &VoiceConfig) -> Arc<dyn VoiceBackend> {
    match (&config.capture_command, &config.recognize_command) {
        (Some(capture), Some(recognize)) => Arc::new(CommandVoice::new(capture, recognize)),
        _ => Arc::new(DisabledVoice::new(
            "VOICE_CAPTURE_CMD and VOICE_RECOGNIZE_CMD are not set",
        )),
    }
}
