use crate::device::Power;
use std::fmt;

/// A resolved command: set `device` to `on`, whatever surface produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub device: String,
    pub on: bool,
}

impl Intent {
    pub fn new(device: impl Into<String>, on: bool) -> Self {
        Self {
            device: device.into(),
            on,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.device, Power::from(self.on))
    }
}
