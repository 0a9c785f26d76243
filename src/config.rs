use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load environment variables from a `.env` file in the working directory.
///
/// Variables already present in the environment win over the file.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    let Ok(content) = fs::read_to_string(env_path) else {
        return;
    };

    for (key, value) in content.lines().filter_map(parse_dotenv_line) {
        if std::env::var(key).is_err() {
            // SAFETY: called from main before the runtime spawns any thread
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Split one `.env` line into key and value, stripping matching quotes.
fn parse_dotenv_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (key, value) = line.split_once('=')?;
    let mut value = value.trim();
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value = &value[1..value.len() - 1];
    }
    Some((key.trim(), value))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ordered device names, fixed for the process lifetime.
    pub devices: Vec<String>,
    pub mqtt: MqttConfig,
    pub gpio: GpioConfig,
    pub voice: VoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub enabled: bool,
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topic every state change is announced on.
    pub topic: String,
    /// Topic accepting `"<Device> <ON|OFF>"` commands; `None` disables it.
    pub command_topic: Option<String>,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
    pub publish_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpioConfig {
    pub enabled: bool,
    pub sysfs_root: PathBuf,
    pub pins: Vec<PinMapping>,
    pub write_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMapping {
    pub device: String,
    pub pin: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Command whose stdout is the captured audio.
    pub capture_command: Option<String>,
    /// Command reading audio on stdin and printing the transcript.
    pub recognize_command: Option<String>,
    pub listen_timeout_secs: u64,
    pub phrase_limit_secs: u64,
    pub calibration_ms: u64,
}

impl MqttConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

impl GpioConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl VoiceConfig {
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_secs(self.listen_timeout_secs)
    }

    pub fn phrase_limit(&self) -> Duration {
        Duration::from_secs(self.phrase_limit_secs)
    }

    pub fn calibration(&self) -> Duration {
        Duration::from_millis(self.calibration_ms)
    }

    /// Voice control needs both a capture and a recognizer command.
    pub fn is_configured(&self) -> bool {
        self.capture_command.is_some() && self.recognize_command.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            devices: ["Light", "Fan", "AC", "TV"]
                .into_iter()
                .map(String::from)
                .collect(),
            mqtt: MqttConfig {
                enabled: true,
                broker_host: "test.mosquitto.org".to_string(),
                broker_port: 1883,
                client_id: default_client_id(),
                username: None,
                password: None,
                topic: "home/demo/device".to_string(),
                command_topic: None,
                keep_alive_secs: 60,
                connect_timeout_secs: 10,
                publish_timeout_ms: 2000,
            },
            gpio: GpioConfig {
                enabled: true,
                sysfs_root: PathBuf::from("/sys/class/gpio"),
                pins: vec![
                    PinMapping::new("Light", 17),
                    PinMapping::new("Fan", 27),
                    PinMapping::new("AC", 22),
                    PinMapping::new("TV", 23),
                ],
                write_timeout_ms: 500,
            },
            voice: VoiceConfig {
                capture_command: None,
                recognize_command: None,
                listen_timeout_secs: 5,
                phrase_limit_secs: 5,
                calibration_ms: 600,
            },
        }
    }
}

impl PinMapping {
    pub fn new(device: impl Into<String>, pin: u32) -> Self {
        Self {
            device: device.into(),
            pin,
        }
    }
}

/// Public brokers reject a second session with the same client id.
fn default_client_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("home-switchboard-{}", &suffix[..8])
}

/// Parse a comma separated device list, dropping empty entries.
pub fn parse_device_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

/// Parse a `Name=pin,Name=pin` mapping.
pub fn parse_pin_map(value: &str) -> Result<Vec<PinMapping>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (device, pin) = entry
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidPinEntry(entry.to_string()))?;
            let pin = pin
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPinEntry(entry.to_string()))?;
            Ok(PinMapping::new(device.trim(), pin))
        })
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(devices) = std::env::var("DEVICES") {
            config.devices = parse_device_list(&devices);
        }

        // MQTT configuration
        if let Ok(enabled) = std::env::var("MQTT_ENABLED")
            && let Some(e) = parse_bool(&enabled)
        {
            config.mqtt.enabled = e;
        }
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Some(port) = env_parsed("MQTT_BROKER_PORT") {
            config.mqtt.broker_port = port;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }
        if let Ok(topic) = std::env::var("MQTT_TOPIC") {
            config.mqtt.topic = topic;
        }
        if let Ok(topic) = std::env::var("MQTT_COMMAND_TOPIC") {
            config.mqtt.command_topic = Some(topic).filter(|t| !t.is_empty());
        }
        if let Some(secs) = env_parsed("MQTT_KEEP_ALIVE_SECS") {
            config.mqtt.keep_alive_secs = secs;
        }
        if let Some(secs) = env_parsed("MQTT_CONNECT_TIMEOUT_SECS") {
            config.mqtt.connect_timeout_secs = secs;
        }
        if let Some(ms) = env_parsed("MQTT_PUBLISH_TIMEOUT_MS") {
            config.mqtt.publish_timeout_ms = ms;
        }

        // GPIO configuration
        if let Ok(enabled) = std::env::var("GPIO_ENABLED")
            && let Some(e) = parse_bool(&enabled)
        {
            config.gpio.enabled = e;
        }
        match std::env::var("GPIO_PINS") {
            Ok(pins) => config.gpio.pins = parse_pin_map(&pins)?,
            Err(_) if std::env::var("DEVICES").is_ok() => config.retain_listed_pins(),
            Err(_) => {}
        }
        if let Ok(root) = std::env::var("GPIO_SYSFS_ROOT") {
            config.gpio.sysfs_root = PathBuf::from(root);
        }
        if let Some(ms) = env_parsed("GPIO_WRITE_TIMEOUT_MS") {
            config.gpio.write_timeout_ms = ms;
        }

        // Voice configuration
        if let Ok(cmd) = std::env::var("VOICE_CAPTURE_CMD") {
            config.voice.capture_command = Some(cmd).filter(|c| !c.trim().is_empty());
        }
        if let Ok(cmd) = std::env::var("VOICE_RECOGNIZE_CMD") {
            config.voice.recognize_command = Some(cmd).filter(|c| !c.trim().is_empty());
        }
        if let Some(secs) = env_parsed("VOICE_LISTEN_TIMEOUT_SECS") {
            config.voice.listen_timeout_secs = secs;
        }
        if let Some(secs) = env_parsed("VOICE_PHRASE_LIMIT_SECS") {
            config.voice.phrase_limit_secs = secs;
        }
        if let Some(ms) = env_parsed("VOICE_CALIBRATION_MS") {
            config.voice.calibration_ms = ms;
        }

        Ok(config)
    }

    /// Check the device set and pin mapping before the registry is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }
        for (i, name) in self.devices.iter().enumerate() {
            if self.devices[..i]
                .iter()
                .any(|other| other.eq_ignore_ascii_case(name))
            {
                return Err(ConfigError::DuplicateDevice(name.clone()));
            }
        }
        for mapping in &self.gpio.pins {
            if !self.devices.contains(&mapping.device) {
                return Err(ConfigError::UnmappedPin(mapping.device.clone()));
            }
        }
        Ok(())
    }

    /// Drop pin mappings for devices that are not in the device list.
    pub fn retain_listed_pins(&mut self) {
        let devices = &self.devices;
        self.gpio.pins.retain(|m| devices.contains(&m.device));
    }

    /// Pin assigned to `device`, if any.
    pub fn pin_for(&self, device: &str) -> Option<u32> {
        self.gpio
            .pins
            .iter()
            .find(|m| m.device == device)
            .map(|m| m.pin)
    }
}
