//! Event system for observers of a mute session.
//!
//! This module provides:
//! - [`EventEmitter`] trait for services to report state changes
//! - [`BroadcastEventBridge`] for fan-out to any number of subscribers
//! - Event types for sessions, devices and connectivity

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

/// Events broadcast to observers.
///
/// Each category has its own inner event type with specific variants.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Mute session lifecycle and UI ticks.
    Session(SessionEvent),

    /// Devices entering or leaving the registry.
    Device(DeviceEvent),

    /// Connectivity changes.
    Network(NetworkEvent),
}

/// Why a mute request did not start a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    /// The host reported no network connectivity.
    NoNetwork,
    /// The registry holds no device.
    NoDevicesFound,
    /// Devices are known but none of them answered a mute-state read.
    DevicesUnreachable,
}

/// Events related to the mute session state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// Devices were muted and the unmute timer started.
    Started {
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Number of devices captured in the snapshot.
        #[serde(rename = "deviceCount")]
        device_count: usize,
        #[serde(rename = "secondsUntilUnmute")]
        seconds_until_unmute: u64,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The unmute deadline was pushed back.
    Extended {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "secondsUntilUnmute")]
        seconds_until_unmute: u64,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Previous mute states were restored.
    Ended {
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Number of devices whose state was written back.
        #[serde(rename = "restoredCount")]
        restored_count: usize,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// Periodic refresh while muted.
    Tick {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "secondsUntilUnmute")]
        seconds_until_unmute: u64,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A mute request changed nothing.
    Rejected {
        reason: RejectReason,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Events related to the device registry.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeviceEvent {
    /// A target-family device was added (or replaced).
    Added {
        #[serde(rename = "deviceId")]
        device_id: String,
        name: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A device left the registry.
    Removed {
        #[serde(rename = "deviceId")]
        device_id: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Events related to network connectivity.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NetworkEvent {
    /// The host reported a connectivity change.
    ConnectivityChanged {
        connected: bool,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}
