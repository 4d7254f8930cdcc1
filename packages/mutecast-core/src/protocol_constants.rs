//! Fixed timing constants that should NOT be changed.
//!
//! These values define the user-visible behavior of a mute session and the
//! discovery retry schedule. [`Config`](crate::state::Config) defaults to
//! exactly these values.

use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Mute Session Timing
// ─────────────────────────────────────────────────────────────────────────────

/// Time added to the unmute deadline by each mute request.
pub const MUTE_LENGTH: Duration = Duration::from_secs(10);

/// Hard ceiling on the remaining mute time (9 minutes 59 seconds).
///
/// However many extensions are requested, the deadline never lies further
/// than this from "now".
pub const MAX_MUTE_LENGTH: Duration = Duration::from_secs(9 * 60 + 59);

/// Interval of the periodic UI refresh while a session is active.
pub const UI_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Slack allowed when checking whether an unmute firing is on time.
pub const UNMUTE_DEADLINE_TOLERANCE: Duration = Duration::from_millis(100);

// ─────────────────────────────────────────────────────────────────────────────
// Discovery Retry
// ─────────────────────────────────────────────────────────────────────────────

/// Delay before the first discovery retry after a failure.
pub const DEFAULT_RETRY_DISCOVERY_DELAY: Duration = Duration::from_secs(10);

/// Factor applied to the retry delay after every scheduled retry.
pub const RETRY_BACKOFF_MULTIPLIER: u32 = 2;

/// Quiet period after which a new failure starts again from the default delay.
pub const RETRY_QUIET_RESET: Duration = Duration::from_secs(60 * 60);

/// Substring of a device's display name that marks the product family we control.
pub const TARGET_FAMILY_MARKER: &str = "Sonos";

// ─────────────────────────────────────────────────────────────────────────────
// Device Control
// ─────────────────────────────────────────────────────────────────────────────

/// Upper bound for a single get/set mute call on a device.
///
/// Device calls run while the controller lock is held, so they must not be
/// allowed to stall it indefinitely.
pub const DEVICE_CALL_TIMEOUT: Duration = Duration::from_secs(5);

// ─────────────────────────────────────────────────────────────────────────────
// Runtime Configuration Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Number of worker threads backing the scheduler.
///
/// The unmute task and the UI tick must never starve each other, so this is
/// a lower bound as well as the default.
pub const SCHEDULER_WORKER_THREADS: usize = 2;

/// Capacity of the event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Capacity of the inbound discovery event channel.
pub const DISCOVERY_EVENT_CHANNEL_CAPACITY: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Application name used in log output.
pub const APP_NAME: &str = "Mutecast";
