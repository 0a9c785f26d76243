use thiserror::Error as ThisError;

/// An intent referenced a device outside the configured set.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
#[error("unknown device: {0}")]
pub struct UnknownDevice(pub String);

#[derive(ThisError, Debug)]
pub enum ActuationError {
    #[error("GPIO pin {pin} write failed: {source}")]
    Io {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("GPIO pin {0} write timed out")]
    Timeout(u32),

    #[error("actuation hardware unavailable: {0}")]
    Unavailable(String),
}

#[derive(ThisError, Debug)]
pub enum TelemetryError {
    #[error("telemetry is not configured")]
    Unavailable,

    #[error("MQTT broker is not connected")]
    Disconnected,

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("MQTT publish timed out")]
    Timeout,

    #[error("MQTT connection failed: {0}")]
    Connect(String),
}

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    #[error("could not understand audio")]
    Unintelligible,

    #[error("speech recognition service error: {0}")]
    Service(String),

    #[error("no speech within the listening window")]
    Timeout,

    #[error("microphone unavailable: {0}")]
    MicrophoneUnavailable(String),
}

#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no devices configured")]
    NoDevices,

    #[error("duplicate device name: {0}")]
    DuplicateDevice(String),

    #[error("GPIO pin mapping references unknown device: {0}")]
    UnmappedPin(String),

    #[error("invalid GPIO pin entry: {0}")]
    InvalidPinEntry(String),
}

#[derive(ThisError, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, AppError>;
