//! Mutecast Core - timed muting of networked speakers.
//!
//! This crate mutes every known speaker on the local network for a short,
//! extendable period and then restores exactly the mute state each one had
//! before. It also keeps the set of known speakers current, retrying discovery
//! with exponential backoff when speakers drop out.
//!
//! The network transport is not part of this crate: hosts plug in their
//! discovery and control stack through the traits in [`device`].
//!
//! # Architecture
//!
//! - [`device`]: Device model, registry and transport traits
//! - [`services`]: Mute controller, discovery retry policy and event processor
//! - [`runtime`]: Delayed/periodic task scheduling
//! - [`scheduler_runtime`]: Dedicated runtime backing the scheduler
//! - [`events`]: Event system for observers
//! - [`state`]: Configuration and connectivity state
//! - [`bootstrap`]: Composition root for a session
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`DeviceControl`](device::DeviceControl): Reading and setting mute on a device
//! - [`DeviceDiscovery`](device::DeviceDiscovery): Enumerating and searching for devices
//! - [`Scheduler`](runtime::Scheduler): Delayed and periodic tasks
//! - [`EventEmitter`](events::EventEmitter): Emitting domain events

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod device;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod runtime;
pub mod scheduler_runtime;
pub mod services;
pub mod state;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_fixtures;

// Re-export commonly used types at the crate root
pub use device::{is_target_family, Device, DeviceControl, DeviceDiscovery, DeviceRegistry};
pub use error::{
    DeviceError, DeviceResult, DiscoveryError, DiscoveryResult, ErrorCode, MutecastError,
    MutecastResult,
};
pub use events::{
    BroadcastEvent, BroadcastEventBridge, DeviceEvent, EventEmitter, LoggingEventEmitter,
    NetworkEvent, NoopEventEmitter, RejectReason, SessionEvent,
};
pub use runtime::{RepeatingTask, Scheduler, TaskFuture, TaskHandle, TokioScheduler};
pub use scheduler_runtime::SchedulerRuntime;
pub use state::{Config, ConnectivityState, RetryConfig};
pub use utils::now_millis;

// Re-export service types
pub use services::{
    DiscoveryEvent, DiscoveryEventProcessor, DiscoveryRetryPolicy, ExtendOutcome, MuteController,
    MuteState, MuteTimings, RetryDecision,
};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_session, bootstrap_session_with_handle, MuteSession};
