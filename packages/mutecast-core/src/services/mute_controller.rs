//! Timed mute/unmute state machine.
//!
//! A mute request captures the current mute state of every known device,
//! mutes them all and arms an unmute timer. Further requests push the
//! deadline back by one increment, never past the configured ceiling. When
//! the timer fires, every device gets back exactly the state it had before.
//!
//! # Locking
//!
//! All session state (snapshot, deadline, task handles) lives behind a single
//! async mutex that is held for the whole of a request or an unmute firing,
//! including the device calls. Device calls are bounded by a timeout so a
//! stuck device cannot hold the lock indefinitely.
//!
//! An extend can race with an unmute that already started: whichever takes the
//! lock first wins, and the loser's actions are idempotent.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::device::{Device, DeviceControl, DeviceRegistry};
use crate::error::{DeviceError, DeviceResult};
use crate::events::{EventEmitter, RejectReason, SessionEvent};
use crate::protocol_constants::{
    DEVICE_CALL_TIMEOUT, MAX_MUTE_LENGTH, MUTE_LENGTH, UI_TICK_PERIOD, UNMUTE_DEADLINE_TOLERANCE,
};
use crate::runtime::{RepeatingTask, Scheduler, TaskHandle};
use crate::state::{Config, ConnectivityState};
use crate::utils::{duration_to_millis, now_millis, round_to_secs};

/// Timing parameters of a mute session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuteTimings {
    /// Added to the deadline by every request.
    pub increment: Duration,
    /// Ceiling on `deadline - now`.
    pub max_length: Duration,
    /// UI tick period while muted.
    pub tick_period: Duration,
    /// Bound on each device call.
    pub device_call_timeout: Duration,
}

impl Default for MuteTimings {
    fn default() -> Self {
        Self {
            increment: MUTE_LENGTH,
            max_length: MAX_MUTE_LENGTH,
            tick_period: UI_TICK_PERIOD,
            device_call_timeout: DEVICE_CALL_TIMEOUT,
        }
    }
}

impl From<&Config> for MuteTimings {
    fn from(config: &Config) -> Self {
        Self {
            increment: config.mute_increment(),
            max_length: config.max_mute_length(),
            tick_period: config.ui_tick_interval(),
            device_call_timeout: config.device_call_timeout(),
        }
    }
}

/// Observable state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteState {
    /// The host reports no connectivity.
    NoNetwork,
    /// No device is known, whether or not a session is active.
    NoDevicesFound,
    /// Devices are known; nothing is muted by us.
    Idle { device_count: usize },
    /// A session is active.
    Muted { seconds_until_unmute: u64 },
}

impl fmt::Display for MuteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoNetwork => write!(f, "No network"),
            Self::NoDevicesFound => write!(f, "No devices found"),
            Self::Idle { device_count } => write!(f, "Found {} devices", device_count),
            Self::Muted {
                seconds_until_unmute,
            } => write!(f, "Muted. Seconds until unmute: {}", seconds_until_unmute),
        }
    }
}

/// Result of a mute request. Informational; mirrors what observers are told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendOutcome {
    /// Rejected: no connectivity.
    NoNetwork,
    /// Rejected: no device known and no session active.
    NoDevicesFound,
    /// Rejected: none of the known devices answered a mute-state read.
    DevicesUnreachable,
    /// A new session started.
    Muted {
        device_count: usize,
        seconds_until_unmute: u64,
    },
    /// The running session was extended.
    Extended { seconds_until_unmute: u64 },
}

/// State guarded by the controller lock.
///
/// Invariant: `previous_mutes` is non-empty exactly when `unmute_at` is set.
#[derive(Default)]
struct SessionState {
    /// Device id to (device, was muted before the session).
    previous_mutes: HashMap<String, (Device, bool)>,
    unmute_at: Option<Instant>,
    unmute_task: Option<TaskHandle>,
    ticker_task: Option<TaskHandle>,
    session_id: Option<Uuid>,
}

impl SessionState {
    fn is_muted(&self) -> bool {
        !self.previous_mutes.is_empty()
    }

    fn seconds_until_unmute(&self, now: Instant) -> u64 {
        self.unmute_at
            .map(|deadline| round_to_secs(deadline.saturating_duration_since(now)))
            .unwrap_or(0)
    }

    fn session_id(&self) -> String {
        self.session_id.map(|id| id.to_string()).unwrap_or_default()
    }
}

/// The mute/unmute state machine.
pub struct MuteController {
    state: Mutex<SessionState>,
    registry: Arc<DeviceRegistry>,
    connectivity: ConnectivityState,
    control: Arc<dyn DeviceControl>,
    scheduler: Arc<dyn Scheduler>,
    emitter: Arc<dyn EventEmitter>,
    timings: MuteTimings,
}

impl MuteController {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        connectivity: ConnectivityState,
        control: Arc<dyn DeviceControl>,
        scheduler: Arc<dyn Scheduler>,
        emitter: Arc<dyn EventEmitter>,
        timings: MuteTimings,
    ) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            registry,
            connectivity,
            control,
            scheduler,
            emitter,
            timings,
        }
    }

    /// Mutes every known device, or extends the running session.
    ///
    /// Never fails: rejections and device errors are logged and reported to
    /// observers; the returned outcome mirrors what they were told.
    pub async fn request_extend_mute(self: &Arc<Self>) -> ExtendOutcome {
        let mut state = self.state.lock().await;

        if !self.connectivity.is_connected() {
            return self.reject(RejectReason::NoNetwork, ExtendOutcome::NoNetwork);
        }

        // An empty registry only blocks starting a session, not extending one.
        if self.registry.is_empty() && !state.is_muted() {
            return self.reject(RejectReason::NoDevicesFound, ExtendOutcome::NoDevicesFound);
        }

        let started = if !state.is_muted() {
            // Devices whose state can't be read are left out and stay unmuted
            let captured = self.capture_mute_states().await;
            if captured.is_empty() {
                return self.reject(
                    RejectReason::DevicesUnreachable,
                    ExtendOutcome::DevicesUnreachable,
                );
            }

            for (device, _) in captured.values() {
                if let Err(e) = self.write_mute(device, true).await {
                    log::warn!("[MuteController] Failed to mute {}: {}", device, e);
                }
            }

            let device_count = captured.len();
            state.previous_mutes = captured;
            state.unmute_at = Some(Instant::now() + self.timings.increment);
            state.session_id = Some(Uuid::new_v4());
            state.ticker_task = Some(self.start_ticker());

            Some(device_count)
        } else {
            let now = Instant::now();
            let ceiling = now + self.timings.max_length;
            let extended = state.unmute_at.unwrap_or(now) + self.timings.increment;
            state.unmute_at = Some(extended.min(ceiling));

            if let Some(handle) = state.unmute_task.take() {
                self.scheduler.cancel(&handle);
            }

            None
        };

        let now = Instant::now();
        let delay = state
            .unmute_at
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or(self.timings.increment);
        state.unmute_task = Some(self.schedule_unmute(delay));

        let seconds_until_unmute = state.seconds_until_unmute(now);
        let session_id = state.session_id();
        let outcome = match started {
            Some(device_count) => {
                log::info!(
                    "[MuteController] Session {} started: muted {} device(s) for {}s",
                    session_id,
                    device_count,
                    seconds_until_unmute
                );
                self.emitter.emit_session(SessionEvent::Started {
                    session_id,
                    device_count,
                    seconds_until_unmute,
                    timestamp: now_millis(),
                });
                ExtendOutcome::Muted {
                    device_count,
                    seconds_until_unmute,
                }
            }
            None => {
                log::info!(
                    "[MuteController] Session {} extended: {}s until unmute",
                    session_id,
                    seconds_until_unmute
                );
                self.emitter.emit_session(SessionEvent::Extended {
                    session_id,
                    seconds_until_unmute,
                    timestamp: now_millis(),
                });
                ExtendOutcome::Extended {
                    seconds_until_unmute,
                }
            }
        };

        log::info!(
            "[MuteController] {}",
            MuteState::Muted {
                seconds_until_unmute
            }
        );
        outcome
    }

    /// Restores every captured device and ends the session.
    ///
    /// Runs as the scheduled unmute task. A second firing for the same session
    /// finds an empty snapshot and changes nothing.
    pub(crate) async fn run_unmute(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        match state.unmute_at {
            Some(deadline) if now + UNMUTE_DEADLINE_TOLERANCE < deadline => {
                log::warn!(
                    "[MuteController] Unmute fired {:?} before the deadline",
                    deadline - now
                );
            }
            None => log::debug!("[MuteController] Unmute fired with no active session"),
            _ => {}
        }

        let previous = std::mem::take(&mut state.previous_mutes);
        for (device, was_muted) in previous.values() {
            if let Err(e) = self.write_mute(device, *was_muted).await {
                log::warn!(
                    "[MuteController] Failed to restore mute={} on {}: {}",
                    was_muted,
                    device,
                    e
                );
            }
        }
        state.unmute_at = None;

        if let Some(handle) = state.ticker_task.take() {
            self.scheduler.cancel(&handle);
        }

        let session_id = state.session_id();
        state.session_id = None;
        if !previous.is_empty() {
            log::info!(
                "[MuteController] Session {} ended: restored {} device(s)",
                session_id,
                previous.len()
            );
        }
        self.emitter.emit_session(SessionEvent::Ended {
            session_id,
            restored_count: previous.len(),
            timestamp: now_millis(),
        });

        // Covers an extend that scheduled a new firing while this one waited for the lock.
        if let Some(handle) = state.unmute_task.take() {
            self.scheduler.cancel(&handle);
        }
    }

    /// Emits one UI tick if a session is active.
    async fn tick(&self) {
        let state = self.state.lock().await;
        if !state.is_muted() {
            return;
        }
        self.emitter.emit_session(SessionEvent::Tick {
            session_id: state.session_id(),
            seconds_until_unmute: state.seconds_until_unmute(Instant::now()),
            timestamp: now_millis(),
        });
    }

    /// Returns the current observable state.
    pub async fn current_state(&self) -> MuteState {
        let state = self.state.lock().await;
        if !self.connectivity.is_connected() {
            return MuteState::NoNetwork;
        }
        if self.registry.is_empty() {
            return MuteState::NoDevicesFound;
        }
        if !state.is_muted() {
            return MuteState::Idle {
                device_count: self.registry.len(),
            };
        }
        MuteState::Muted {
            seconds_until_unmute: state.seconds_until_unmute(Instant::now()),
        }
    }

    /// Whole seconds until the unmute fires, halves rounding up; 0 when idle.
    pub async fn seconds_until_unmute(&self) -> u64 {
        self.state.lock().await.seconds_until_unmute(Instant::now())
    }

    /// Returns true while a session is active.
    pub async fn is_muted(&self) -> bool {
        self.state.lock().await.is_muted()
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity.is_connected()
    }

    pub fn known_device_count(&self) -> usize {
        self.registry.len()
    }

    fn reject(&self, reason: RejectReason, outcome: ExtendOutcome) -> ExtendOutcome {
        log::info!("[MuteController] Mute request rejected: {:?}", reason);
        self.emitter.emit_session(SessionEvent::Rejected {
            reason,
            timestamp: now_millis(),
        });
        outcome
    }

    /// Reads every registry device's mute state before anything is written.
    ///
    /// Devices that cannot be read are left out.
    async fn capture_mute_states(&self) -> HashMap<String, (Device, bool)> {
        let mut captured = HashMap::new();
        for device in self.registry.snapshot() {
            match self.read_mute(&device).await {
                Ok(muted) => {
                    log::debug!("[MuteController] {} was muted={}", device, muted);
                    captured.insert(device.id.clone(), (device, muted));
                }
                Err(e) => {
                    log::warn!(
                        "[MuteController] Skipping {}: could not read mute state: {}",
                        device,
                        e
                    );
                }
            }
        }
        captured
    }

    async fn read_mute(&self, device: &Device) -> DeviceResult<bool> {
        let timeout = self.timings.device_call_timeout;
        tokio::time::timeout(timeout, self.control.get_mute(device))
            .await
            .map_err(|_| DeviceError::Timeout {
                action: "GetMute",
                timeout_ms: duration_to_millis(timeout),
            })?
    }

    async fn write_mute(&self, device: &Device, mute: bool) -> DeviceResult<()> {
        let timeout = self.timings.device_call_timeout;
        tokio::time::timeout(timeout, self.control.set_mute(device, mute))
            .await
            .map_err(|_| DeviceError::Timeout {
                action: "SetMute",
                timeout_ms: duration_to_millis(timeout),
            })?
    }

    fn schedule_unmute(self: &Arc<Self>, delay: Duration) -> TaskHandle {
        let controller = Arc::clone(self);
        self.scheduler.schedule_once(
            "unmute",
            delay,
            async move { controller.run_unmute().await }.boxed(),
        )
    }

    fn start_ticker(self: &Arc<Self>) -> TaskHandle {
        let weak: Weak<Self> = Arc::downgrade(self);
        let task: RepeatingTask = Arc::new(move || {
            let weak = weak.clone();
            async move {
                if let Some(controller) = weak.upgrade() {
                    controller.tick().await;
                }
            }
            .boxed()
        });
        self.scheduler.schedule_repeating(
            "ui-tick",
            self.timings.tick_period,
            self.timings.tick_period,
            task,
        )
    }
}
