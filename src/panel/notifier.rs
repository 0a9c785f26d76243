//! Projection of registry state onto the control panel.

use crate::device::{DeviceSnapshot, Power};
use std::sync::Arc;

/// Render target for the control panel. Window construction lives behind
/// this trait.
pub trait UiSurface: Send + Sync {
    /// Update the label shown for one device.
    fn render(&self, device: &str, label: &str);

    /// Show a transient status line (voice results, rejected commands).
    fn notice(&self, _message: &str) {}
}

/// Label shown for a device, e.g. `"Light: ON"`.
pub fn device_label(device: &str, on: bool) -> String {
    format!("{}: {}", device, Power::from(on))
}

/// Re-renders every device label from a registry snapshot.
#[derive(Clone)]
pub struct UiNotifier {
    surface: Arc<dyn UiSurface>,
}

impl UiNotifier {
    pub fn new(surface: Arc<dyn UiSurface>) -> Self {
        Self { surface }
    }

    pub fn refresh(&self, snapshot: &[DeviceSnapshot]) {
        for device in snapshot {
            self.surface
                .render(&device.name, &device_label(&device.name, device.on));
        }
    }

    pub fn notice(&self, message: &str) {
        self.surface.notice(message);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Surface that records every render call.
    #[derive(Default)]
    pub(crate) struct RecordingSurface {
        pub renders: Mutex<Vec<(String, String)>>,
        pub notices: Mutex<Vec<String>>,
    }

    impl RecordingSurface {
        /// Most recent label rendered for `device`.
        pub fn label(&self, device: &str) -> Option<String> {
            self.renders
                .lock()
                .iter()
                .rev()
                .find(|(name, _)| name == device)
                .map(|(_, label)| label.clone())
        }
    }

    impl UiSurface for RecordingSurface {
        fn render(&self, device: &str, label: &str) {
            self.renders
                .lock()
                .push((device.to_string(), label.to_string()));
        }

        fn notice(&self, message: &str) {
            self.notices.lock().push(message.to_string());
        }
    }

    #[test]
    fn test_device_label() {
        assert_eq!(device_label("Light", true), "Light: ON");
        assert_eq!(device_label("Fan", false), "Fan: OFF");
    }

    #[test]
    fn test_refresh_renders_every_device_in_order() {
        let surface = Arc::new(RecordingSurface::default());
        let notifier = UiNotifier::new(surface.clone());
        notifier.refresh(&[
            DeviceSnapshot {
                name: "Light".to_string(),
                on: true,
            },
            DeviceSnapshot {
                name: "Fan".to_string(),
                on: false,
            },
        ]);

        assert_eq!(
            *surface.renders.lock(),
            vec![
                ("Light".to_string(), "Light: ON".to_string()),
                ("Fan".to_string(), "Fan: OFF".to_string()),
            ]
        );
    }
}
