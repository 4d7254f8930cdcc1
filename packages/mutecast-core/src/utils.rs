//! General utilities shared across the crate.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_to_millis)
        .unwrap_or(0)
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
#[must_use]
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Rounds a duration to whole seconds, halves rounding up.
///
/// 9.4s becomes 9, 9.5s becomes 10.
#[must_use]
pub fn round_to_secs(duration: Duration) -> u64 {
    let millis = duration.as_millis();
    u64::try_from((millis + 500) / 1000).unwrap_or(u64::MAX)
}
