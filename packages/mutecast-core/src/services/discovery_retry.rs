//! Backoff policy for re-running discovery after target devices fail.
//!
//! When a device of the target family drops out with a failure, a fresh
//! search is scheduled after a delay that doubles with each consecutive
//! retry. Failures arriving while a retry is pending are coalesced into it.
//! After a long enough quiet period the delay starts again from the initial value.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::device::{is_target_family, DeviceDiscovery};
use crate::runtime::Scheduler;
use crate::state::RetryConfig;

/// What the policy did with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Not a target-family device.
    Ignored,
    /// A retry is already pending.
    Coalesced,
    /// A retry was scheduled after the given delay.
    Scheduled(Duration),
}

/// Backoff bookkeeping guarded by the policy lock.
#[derive(Debug)]
struct BackoffState {
    /// Delay for the next scheduled retry.
    delay: Duration,
    retry_scheduled: bool,
    last_retry_start: Option<Instant>,
}

/// Schedules discovery retries with exponential backoff.
///
/// At most one retry is outstanding at any time.
pub struct DiscoveryRetryPolicy {
    state: Mutex<BackoffState>,
    scheduler: Arc<dyn Scheduler>,
    discovery: Arc<dyn DeviceDiscovery>,
    config: RetryConfig,
    marker: String,
}

impl DiscoveryRetryPolicy {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        discovery: Arc<dyn DeviceDiscovery>,
        config: RetryConfig,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            state: Mutex::new(BackoffState {
                delay: config.initial_delay(),
                retry_scheduled: false,
                last_retry_start: None,
            }),
            scheduler,
            discovery,
            config,
            marker: marker.into(),
        }
    }

    /// Handles a discovery failure reported for `device_id`.
    pub fn on_discovery_failed(
        self: &Arc<Self>,
        device_id: &str,
        display_name: &str,
    ) -> RetryDecision {
        if !is_target_family(display_name, &self.marker) {
            log::debug!(
                "[DiscoveryRetry] Ignoring failure of non-target device {} ({})",
                display_name,
                device_id
            );
            return RetryDecision::Ignored;
        }

        let mut state = self.state.lock();
        if state.retry_scheduled {
            log::debug!(
                "[DiscoveryRetry] Retry already pending, coalescing failure of {}",
                device_id
            );
            return RetryDecision::Coalesced;
        }

        let quiet = state
            .last_retry_start
            .map_or(true, |start| start.elapsed() > self.config.quiet_reset());
        if quiet {
            state.delay = self.config.initial_delay();
        }

        let delay = state.delay;
        state.retry_scheduled = true;
        state.delay = delay.saturating_mul(self.config.multiplier);

        let policy = Arc::clone(self);
        self.scheduler.schedule_once(
            "discovery-retry",
            delay,
            async move { policy.run_retry().await }.boxed(),
        );

        log::info!(
            "[DiscoveryRetry] {} failed, retrying discovery in {:?}",
            display_name,
            delay
        );
        RetryDecision::Scheduled(delay)
    }

    /// Body of the scheduled retry.
    async fn run_retry(&self) {
        {
            let mut state = self.state.lock();
            state.retry_scheduled = false;
            state.last_retry_start = Some(Instant::now());
        }

        log::info!("[DiscoveryRetry] Retrying discovery");
        if let Err(e) = self.discovery.trigger_search().await {
            log::warn!("[DiscoveryRetry] Discovery search failed: {}", e);
        }
    }

    /// Delay the next scheduled retry would use, before any quiet-period reset.
    pub fn current_delay(&self) -> Duration {
        self.state.lock().delay
    }

    pub fn is_retry_scheduled(&self) -> bool {
        self.state.lock().retry_scheduled
    }
}
