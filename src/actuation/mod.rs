//! Actuation backends.
//!
//! The backend is chosen once at startup: sysfs GPIO when the hardware is
//! present, otherwise [`NullActuator`]. The dispatcher only sees
//! [`ActuationSink`].

mod gpio;

pub use gpio::HardwareActuator;

use crate::config::GpioConfig;
use crate::error::ActuationError;
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;

/// Turns a committed state change into a physical signal.
#[async_trait]
pub trait ActuationSink: Send + Sync {
    /// Drive the output for `device`. Devices without a pin are a no-op.
    async fn apply(&self, device: &str, pin: Option<u32>, on: bool) -> Result<(), ActuationError>;

    /// Release hardware at process exit.
    async fn shutdown(&self) {}

    /// Short backend name for startup logs.
    fn describe(&self) -> &'static str;
}

/// Backend used when no hardware is configured. Always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullActuator;

#[async_trait]
impl ActuationSink for NullActuator {
    async fn apply(
        &self,
        _device: &str,
        _pin: Option<u32>,
        _on: bool,
    ) -> Result<(), ActuationError> {
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "none"
    }
}

/// Pick the actuation backend for this session.
pub fn select_actuator(config: &GpioConfig) -> Arc<dyn ActuationSink> {
    if !config.enabled || config.pins.is_empty() {
        info!("[GPIO] Hardware actuation disabled");
        return Arc::new(NullActuator);
    }

    match HardwareActuator::open(
        &config.sysfs_root,
        config.pins.iter().map(|m| m.pin),
        config.write_timeout(),
    ) {
        Ok(actuator) => Arc::new(actuator),
        Err(e) => {
            warn!("[GPIO] {}; continuing without hardware", e);
            Arc::new(NullActuator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_null_actuator_always_succeeds() {
        let sink = NullActuator;
        assert!(sink.apply("Light", Some(17), true).await.is_ok());
        assert!(sink.apply("AC", None, false).await.is_ok());
    }

    #[test]
    fn test_select_falls_back_to_null() {
        let mut config = Config::default().gpio;
        config.sysfs_root = std::env::temp_dir().join(format!("no-gpio-{}", uuid::Uuid::new_v4()));
        assert_eq!(select_actuator(&config).describe(), "none");

        config.enabled = false;
        assert_eq!(select_actuator(&config).describe(), "none");
    }
}
