//! Trait abstractions for the device transport.
//!
//! The core never talks to the network itself. These traits are implemented
//! by whatever discovery/control stack the host embeds, and by mocks in tests.

use async_trait::async_trait;

use crate::device::types::Device;
use crate::error::{DeviceResult, DiscoveryResult};

/// Trait for per-device mute control.
///
/// Used by `MuteController` to capture and restore mute state.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Gets the current mute state of a device.
    ///
    /// # Returns
    /// `true` if the device is muted, `false` otherwise
    async fn get_mute(&self, device: &Device) -> DeviceResult<bool>;

    /// Sets the mute state of a device.
    ///
    /// # Arguments
    /// * `device` - The device to control
    /// * `mute` - `true` to mute, `false` to unmute
    async fn set_mute(&self, device: &Device, mute: bool) -> DeviceResult<()>;
}

/// Trait for the outbound half of device discovery.
///
/// The inbound half (devices appearing, disappearing, failing) arrives as
/// [`DiscoveryEvent`](crate::services::DiscoveryEvent)s on a channel.
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// Returns every device the discovery layer currently knows about.
    async fn known_devices(&self) -> DiscoveryResult<Vec<Device>>;

    /// Starts a fresh asynchronous search for devices.
    ///
    /// Results are delivered later as discovery events.
    async fn trigger_search(&self) -> DiscoveryResult<()>;
}
