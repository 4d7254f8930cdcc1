//! Domain types for controllable devices.

use serde::Serialize;

/// A reachable, controllable audio device.
///
/// The `address` is opaque to the core; it is whatever the
/// [`DeviceControl`](super::DeviceControl) implementation needs to reach the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Device {
    /// Stable unique identifier (e.g. the UPnP UDN).
    pub id: String,
    /// Friendly name for display.
    pub name: String,
    /// Transport address of the device.
    pub address: String,
}

impl Device {
    /// Creates a new device handle.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Returns true if a display name marks a device of the product family we control.
///
/// Plain case-sensitive substring match.
#[must_use]
pub fn is_target_family(display_name: &str, marker: &str) -> bool {
    display_name.contains(marker)
}
