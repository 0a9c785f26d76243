//! Canonical device table.
//!
//! The key set is fixed at construction. Reads are available to anyone
//! holding a reference; the only write path is crate-private and used by
//! [`CommandDispatcher`](crate::control::CommandDispatcher).

use super::switch_state::SwitchState;
use crate::config::Config;
use crate::error::{ConfigError, UnknownDevice};

/// One configured appliance.
pub struct Device {
    name: String,
    pin: Option<u32>,
    state: SwitchState,
}

impl Device {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pin(&self) -> Option<u32> {
        self.pin
    }

    pub fn is_on(&self) -> bool {
        self.state.get()
    }

    pub fn version(&self) -> u32 {
        self.state.version()
    }
}

/// Point-in-time view of one device, used for UI refreshes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub name: String,
    pub on: bool,
}

/// Ordered, fixed mapping of device name to on/off state.
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    /// Build a registry from `(name, pin)` pairs. Every device starts OFF.
    pub fn new<I, S>(devices: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, Option<u32>)>,
        S: Into<String>,
    {
        let mut built: Vec<Device> = Vec::new();
        for (name, pin) in devices {
            let name = name.into();
            if built.iter().any(|d| d.name.eq_ignore_ascii_case(&name)) {
                return Err(ConfigError::DuplicateDevice(name));
            }
            built.push(Device {
                name,
                pin,
                state: SwitchState::default(),
            });
        }
        if built.is_empty() {
            return Err(ConfigError::NoDevices);
        }
        Ok(Self { devices: built })
    }

    /// Build from the startup configuration, validating it first.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::new(
            config
                .devices
                .iter()
                .map(|name| (name.clone(), config.pin_for(name))),
        )
    }

    fn device(&self, name: &str) -> Result<&Device, UnknownDevice> {
        self.devices
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| UnknownDevice(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<bool, UnknownDevice> {
        self.device(name).map(Device::is_on)
    }

    pub fn pin(&self, name: &str) -> Result<Option<u32>, UnknownDevice> {
        self.device(name).map(Device::pin)
    }

    /// Case-insensitive lookup returning the canonical device name.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.devices
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name.trim()))
            .map(|d| d.name.as_str())
    }

    /// Commit `state` and return the previous value.
    pub(crate) fn set(&self, name: &str, state: bool) -> Result<bool, UnknownDevice> {
        self.device(name).map(|d| d.state.set(state))
    }

    /// Device names in configuration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.devices.iter().map(|d| d.name.as_str())
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn snapshot(&self) -> Vec<DeviceSnapshot> {
        self.devices
            .iter()
            .map(|d| DeviceSnapshot {
                name: d.name.clone(),
                on: d.is_on(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new([
            ("Light", Some(17)),
            ("Fan", Some(27)),
            ("AC", None),
            ("TV", Some(23)),
        ])
        .unwrap()
    }

    #[test]
    fn test_names_keep_insertion_order() {
        let registry = registry();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["Light", "Fan", "AC", "TV"]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_devices_start_off() {
        let registry = registry();
        assert!(registry.snapshot().iter().all(|d| !d.on));
    }

    #[test]
    fn test_unknown_device() {
        let registry = registry();
        assert_eq!(
            registry.get("Heater"),
            Err(UnknownDevice("Heater".to_string()))
        );
        assert!(registry.set("Heater", true).is_err());
        // Lookups are exact
        assert!(registry.get("light").is_err());
    }

    #[test]
    fn test_set_returns_previous() {
        let registry = registry();
        assert_eq!(registry.set("Fan", true), Ok(false));
        assert_eq!(registry.set("Fan", true), Ok(true));
        assert_eq!(registry.get("Fan"), Ok(true));
        assert_eq!(registry.devices()[1].version(), 1);
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let registry = registry();
        assert_eq!(registry.resolve("light"), Some("Light"));
        assert_eq!(registry.resolve(" tv "), Some("TV"));
        assert_eq!(registry.resolve("Heater"), None);
    }

    #[test]
    fn test_pins() {
        let registry = registry();
        assert_eq!(registry.pin("Light"), Ok(Some(17)));
        assert_eq!(registry.pin("AC"), Ok(None));
    }

    #[test]
    fn test_rejects_duplicates_and_empty_sets() {
        assert!(matches!(
            DeviceRegistry::new([("Light", None), ("LIGHT", None)]),
            Err(ConfigError::DuplicateDevice(_))
        ));
        assert!(matches!(
            DeviceRegistry::new(Vec::<(String, Option<u32>)>::new()),
            Err(ConfigError::NoDevices)
        ));
    }

    #[test]
    fn test_from_config() {
        let registry = DeviceRegistry::from_config(&Config::default()).unwrap();
        assert_eq!(registry.pin("TV"), Ok(Some(23)));
    }
}
