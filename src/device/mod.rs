//! Device state for the fixed appliance set.

mod registry;
mod switch_state;

pub use registry::{Device, DeviceRegistry, DeviceSnapshot};
pub use switch_state::SwitchState;

use strum::{Display, EnumString};

/// Wire representation of a device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Power {
    #[strum(serialize = "ON")]
    On,
    #[strum(serialize = "OFF")]
    Off,
}

impl From<bool> for Power {
    fn from(on: bool) -> Self {
        if on { Power::On } else { Power::Off }
    }
}

impl From<Power> for bool {
    fn from(power: Power) -> Self {
        power == Power::On
    }
}
