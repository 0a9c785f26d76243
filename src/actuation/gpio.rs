//! Linux sysfs GPIO actuator.
//!
//! Pins are exported and configured as outputs outside this process; this
//! backend only writes their `value` files.

use super::ActuationSink;
use crate::error::ActuationError;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Drives physical outputs through `<root>/gpio<pin>/value`.
pub struct HardwareActuator {
    root: PathBuf,
    pins: Vec<u32>,
    write_timeout: Duration,
}

impl HardwareActuator {
    /// Open the sysfs tree and check every configured pin is exported.
    pub fn open(
        root: impl AsRef<Path>,
        pins: impl IntoIterator<Item = u32>,
        write_timeout: Duration,
    ) -> Result<Self, ActuationError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ActuationError::Unavailable(format!(
                "{} not found",
                root.display()
            )));
        }

        let pins: Vec<u32> = pins.into_iter().collect();
        let actuator = Self {
            root,
            pins,
            write_timeout,
        };
        for &pin in &actuator.pins {
            if !actuator.value_path(pin).exists() {
                return Err(ActuationError::Unavailable(format!(
                    "gpio{} is not exported",
                    pin
                )));
            }
        }

        info!(
            "[GPIO] Using {} with pins {:?}",
            actuator.root.display(),
            actuator.pins
        );
        Ok(actuator)
    }

    fn value_path(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin)).join("value")
    }

    async fn write_level(&self, pin: u32, on: bool) -> Result<(), ActuationError> {
        let path = self.value_path(pin);
        let level: &[u8] = if on { b"1" } else { b"0" };

        let write = async {
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .open(&path)
                .await?;
            file.write_all(level).await?;
            file.flush().await
        };

        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(ActuationError::Io { pin, source }),
            Err(_) => Err(ActuationError::Timeout(pin)),
        }
    }
}

#[async_trait]
impl ActuationSink for HardwareActuator {
    async fn apply(&self, device: &str, pin: Option<u32>, on: bool) -> Result<(), ActuationError> {
        let Some(pin) = pin else {
            debug!("[GPIO] {} has no pin mapping, skipping", device);
            return Ok(());
        };
        self.write_level(pin, on).await?;
        debug!(
            "[GPIO] {} -> gpio{} {}",
            device,
            pin,
            if on { "HIGH" } else { "LOW" }
        );
        Ok(())
    }

    async fn shutdown(&self) {
        for &pin in &self.pins {
            if let Err(e) = self.write_level(pin, false).await {
                warn!("[GPIO] Failed to reset gpio{}: {}", pin, e);
            }
        }
        info!("[GPIO] All outputs driven low");
    }

    fn describe(&self) -> &'static str {
        "sysfs GPIO"
    }
}
