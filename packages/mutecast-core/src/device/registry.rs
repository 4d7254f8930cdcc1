//! Registry of currently reachable devices.
//!
//! # Concurrency design
//!
//! Backed by a `DashMap` so discovery events can upsert and remove entries
//! while the mute controller takes snapshots, without a registry-wide lock
//! serializing the two. A snapshot clones every entry, so callers iterate a
//! consistent copy and never a half-written device.

use dashmap::DashMap;

use crate::device::types::Device;

/// Thread-safe map of device id to device handle.
///
/// Invariant: at most one entry per id; an entry means the device is
/// currently believed reachable.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: DashMap<String, Device>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the device stored under `id`.
    ///
    /// Returns the previous entry if there was one.
    pub fn add(&self, id: impl Into<String>, device: Device) -> Option<Device> {
        self.devices.insert(id.into(), device)
    }

    /// Removes the device stored under `id`.
    ///
    /// Returns true if an entry existed.
    pub fn remove(&self, id: &str) -> bool {
        self.take(id).is_some()
    }

    /// Removes and returns the device stored under `id`.
    pub fn take(&self, id: &str) -> Option<Device> {
        self.devices.remove(id).map(|(_, device)| device)
    }

    /// Returns a copy of the device stored under `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Device> {
        self.devices.get(id).map(|entry| entry.value().clone())
    }

    /// Returns a point-in-time copy of all devices (order is unspecified).
    #[must_use]
    pub fn snapshot(&self) -> Vec<Device> {
        self.devices
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of known devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns true if no device is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Forgets every device.
    pub fn clear(&self) {
        let count = self.devices.len();
        self.devices.clear();
        log::debug!("[Registry] Cleared {} device(s)", count);
    }
}
