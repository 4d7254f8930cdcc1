//! Application services layer.
//!
//! This module contains the mute/unmute state machine and the services that
//! keep its view of the network current.

pub mod discovery_events;
pub mod discovery_retry;
pub mod mute_controller;

pub use discovery_events::{DiscoveryEvent, DiscoveryEventProcessor};
pub use discovery_retry::{DiscoveryRetryPolicy, RetryDecision};
pub use mute_controller::{ExtendOutcome, MuteController, MuteState, MuteTimings};
