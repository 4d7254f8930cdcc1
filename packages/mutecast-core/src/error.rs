//! Centralized error types for the Mutecast core library.
//!
//! Errors never escape the public trigger/query interface of the mute
//! controller; they exist so collaborators can report failures which are then
//! logged, and so configuration and bootstrap can fail cleanly.

use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Collaborator Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors reported by a [`DeviceControl`](crate::device::DeviceControl) implementation.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The call did not complete within the configured bound.
    #[error("{action} timed out after {timeout_ms}ms")]
    Timeout {
        /// Action that timed out (e.g. "GetMute").
        action: &'static str,
        /// The bound that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    /// The device could not be reached.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// The device answered with an error.
    #[error("device fault: {0}")]
    Fault(String),
}

/// Convenient Result alias for device control operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors reported by a [`DeviceDiscovery`](crate::device::DeviceDiscovery) implementation.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The search could not be started.
    #[error("discovery search failed: {0}")]
    SearchFailed(String),

    /// The discovery service is not (or no longer) available.
    #[error("discovery service unavailable")]
    Unavailable,
}

/// Convenient Result alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

impl ErrorCode for DeviceError {
    fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "device_timeout",
            Self::Unreachable(_) => "device_unreachable",
            Self::Fault(_) => "device_fault",
        }
    }
}

impl ErrorCode for DiscoveryError {
    fn code(&self) -> &'static str {
        match self {
            Self::SearchFailed(_) => "discovery_search_failed",
            Self::Unavailable => "discovery_unavailable",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Application Error
// ─────────────────────────────────────────────────────────────────────────────

/// Application-wide error type.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum MutecastError {
    /// A device control call failed.
    #[error("Device error: {0}")]
    Device(String),

    /// Device discovery failed.
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// The scheduler could not be created or is shut down.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ErrorCode for MutecastError {
    fn code(&self) -> &'static str {
        match self {
            Self::Device(_) => "device_error",
            Self::Discovery(_) => "discovery_failed",
            Self::Scheduler(_) => "scheduler_error",
            Self::Configuration(_) => "configuration_error",
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type MutecastResult<T> = Result<T, MutecastError>;

impl From<DeviceError> for MutecastError {
    fn from(err: DeviceError) -> Self {
        Self::Device(err.to_string())
    }
}

impl From<DiscoveryError> for MutecastError {
    fn from(err: DiscoveryError) -> Self {
        Self::Discovery(err.to_string())
    }
}
