//! Speech capture and recognition backends.
//!
//! All methods block; callers run them off the panel task.

use crate::error::VoiceError;
use log::debug;
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::io::{Read, Write};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound for one recognizer run.
const RECOGNIZE_TIMEOUT: Duration = Duration::from_secs(15);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured audio, opaque to everything but the backend that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioBuffer {
    pub data: Vec<u8>,
}

pub trait VoiceBackend: Send + Sync {
    /// Adjust for ambient noise before listening.
    fn calibrate(&self, _duration: Duration) -> Result<(), VoiceError> {
        Ok(())
    }

    /// Wait up to `timeout` for speech and record at most `phrase_limit` of it.
    fn listen(&self, timeout: Duration, phrase_limit: Duration) -> Result<AudioBuffer, VoiceError>;

    /// Turn audio into text.
    fn recognize(&self, audio: &AudioBuffer) -> Result<String, VoiceError>;
}

/// Backend for sessions without a microphone.
pub struct DisabledVoice {
    reason: String,
}

impl DisabledVoice {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl VoiceBackend for DisabledVoice {
    fn listen(
        &self,
        _timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<AudioBuffer, VoiceError> {
        Err(VoiceError::MicrophoneUnavailable(self.reason.clone()))
    }

    fn recognize(&self, _audio: &AudioBuffer) -> Result<String, VoiceError> {
        Err(VoiceError::MicrophoneUnavailable(self.reason.clone()))
    }
}

/// Backend driving two external programs through `sh -c`.
///
/// The capture command writes raw audio to stdout and receives the listening
/// window in `VOICE_TIMEOUT_SECS` / `VOICE_PHRASE_LIMIT_SECS`. The recognizer
/// reads that audio on stdin and prints the transcript.
pub struct CommandVoice {
    capture: String,
    recognize: String,
}

impl CommandVoice {
    pub fn new(capture: impl Into<String>, recognize: impl Into<String>) -> Self {
        Self {
            capture: capture.into(),
            recognize: recognize.into(),
        }
    }
}

impl VoiceBackend for CommandVoice {
    fn listen(&self, timeout: Duration, phrase_limit: Duration) -> Result<AudioBuffer, VoiceError> {
        let mut command = shell(&self.capture);
        command
            .env("VOICE_TIMEOUT_SECS", timeout.as_secs().to_string())
            .env("VOICE_PHRASE_LIMIT_SECS", phrase_limit.as_secs().to_string());

        let run = run_with_deadline(command, None, timeout + phrase_limit)
            .map_err(|e| VoiceError::MicrophoneUnavailable(e.to_string()))?;
        let Some((status, data)) = run else {
            return Err(VoiceError::Timeout);
        };
        if !status.success() {
            return Err(VoiceError::MicrophoneUnavailable(format!(
                "capture command exited with {}",
                status
            )));
        }
        if data.is_empty() {
            return Err(VoiceError::Timeout);
        }

        debug!("[Voice] Captured {} bytes", data.len());
        Ok(AudioBuffer { data })
    }

    fn recognize(&self, audio: &AudioBuffer) -> Result<String, VoiceError> {
        let run = run_with_deadline(
            shell(&self.recognize),
            Some(audio.data.clone()),
            RECOGNIZE_TIMEOUT,
        )
        .map_err(|e| VoiceError::Service(e.to_string()))?;
        let Some((status, out)) = run else {
            return Err(VoiceError::Service("recognizer timed out".to_string()));
        };
        if !status.success() {
            return Err(VoiceError::Service(format!(
                "recognizer exited with {}",
                status
            )));
        }

        let text = String::from_utf8_lossy(&out).trim().to_string();
        if text.is_empty() {
            return Err(VoiceError::Unintelligible);
        }
        Ok(text)
    }
}

fn shell(script: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(script);
    command
}

/// Run `command`, feeding `input` on stdin, and collect stdout.
///
/// The command runs in its own process group. Returns `Ok(None)` when the
/// deadline passes; the whole group is killed, pipelines included.
fn run_with_deadline(
    mut command: Command,
    input: Option<Vec<u8>>,
    deadline: Duration,
) -> std::io::Result<Option<(ExitStatus, Vec<u8>)>> {
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .process_group(0);
    let mut child = command.spawn()?;

    if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
        thread::spawn(move || {
            let _ = stdin.write_all(&input);
        });
    }
    let reader = child.stdout.take().map(|mut stdout| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf);
            buf
        })
    });

    let Some(status) = wait_until(&mut child, Instant::now() + deadline)? else {
        kill_group(&child);
        let _ = child.kill();
        let _ = child.wait();
        return Ok(None);
    };
    // Background leftovers would hold stdout open and block the reader
    kill_group(&child);

    let output = match reader {
        Some(handle) => handle.join().unwrap_or_default(),
        None => Vec::new(),
    };
    Ok(Some((status, output)))
}

fn kill_group(child: &Child) {
    let Ok(pgid) = i32::try_from(child.id()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => debug!("[Voice] Failed to kill process group {}: {}", pgid, e),
    }
}

fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
