//! Thread-safe on/off state for a single appliance.
//!
//! Readers on any thread see exactly one boolean value; writes go through
//! [`DeviceRegistry`](super::DeviceRegistry), which only the dispatcher can
//! reach mutably.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Binary switch state with a change counter.
///
/// The version is incremented each time the value actually changes, so
/// observers can tell a no-op write apart from a real transition.
pub struct SwitchState {
    state: AtomicBool,
    version: AtomicU32,
}

impl SwitchState {
    /// Create a new switch with the given initial state.
    pub fn new(initial: bool) -> Self {
        Self {
            state: AtomicBool::new(initial),
            version: AtomicU32::new(0),
        }
    }

    /// Get the current switch state.
    pub fn get(&self) -> bool {
        self.state.load(Ordering::SeqCst)
    }

    /// Number of real transitions since creation.
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    /// Store `value` and return the previous state.
    pub(crate) fn set(&self, value: bool) -> bool {
        let old = self.state.swap(value, Ordering::SeqCst);
        if old != value {
            self.version.fetch_add(1, Ordering::SeqCst);
        }
        old
    }
}

impl Default for SwitchState {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let switch = SwitchState::new(true);
        assert!(switch.get());
        assert_eq!(switch.version(), 0);

        let switch = SwitchState::default();
        assert!(!switch.get());
        assert_eq!(switch.version(), 0);
    }

    #[test]
    fn test_set_returns_previous_and_counts_transitions() {
        let switch = SwitchState::new(false);

        assert!(!switch.set(true));
        assert!(switch.get());
        assert_eq!(switch.version(), 1);

        // Same value is not a transition
        assert!(switch.set(true));
        assert_eq!(switch.version(), 1);

        assert!(switch.set(false));
        assert!(!switch.get());
        assert_eq!(switch.version(), 2);
    }
}
