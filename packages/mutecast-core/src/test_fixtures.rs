//! Hand-written mocks of the collaborator traits, shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::device::{Device, DeviceControl, DeviceDiscovery};
use crate::error::{DeviceError, DeviceResult, DiscoveryError, DiscoveryResult};
use crate::events::{DeviceEvent, EventEmitter, NetworkEvent, SessionEvent};
use crate::runtime::{RepeatingTask, Scheduler, TaskFuture, TaskHandle};

pub(crate) fn device(id: &str) -> Device {
    Device::new(id, format!("{} - Sonos One", id), format!("192.168.1.{}", id.len()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Device Control
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ControlCall {
    Get(String),
    Set(String, bool),
}

/// In-memory device control: one mute flag per device id.
#[derive(Default)]
pub(crate) struct MockDeviceControl {
    mutes: Mutex<HashMap<String, bool>>,
    failing_reads: Mutex<HashSet<String>>,
    failing_writes: Mutex<HashSet<String>>,
    hanging_reads: Mutex<HashSet<String>>,
    calls: Mutex<Vec<ControlCall>>,
}

impl MockDeviceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, id: &str, muted: bool) {
        self.mutes.lock().insert(id.to_string(), muted);
    }

    pub fn state(&self, id: &str) -> Option<bool> {
        self.mutes.lock().get(id).copied()
    }

    pub fn fail_reads(&self, id: &str) {
        self.failing_reads.lock().insert(id.to_string());
    }

    pub fn fail_writes(&self, id: &str) {
        self.failing_writes.lock().insert(id.to_string());
    }

    /// Reads of this device never complete.
    pub fn hang_reads(&self, id: &str) {
        self.hanging_reads.lock().insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<ControlCall> {
        self.calls.lock().clone()
    }

    pub fn set_calls(&self) -> Vec<(String, bool)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                ControlCall::Set(id, mute) => Some((id.clone(), *mute)),
                ControlCall::Get(_) => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl DeviceControl for MockDeviceControl {
    async fn get_mute(&self, device: &Device) -> DeviceResult<bool> {
        self.calls.lock().push(ControlCall::Get(device.id.clone()));
        if self.hanging_reads.lock().contains(&device.id) {
            std::future::pending::<()>().await;
        }
        if self.failing_reads.lock().contains(&device.id) {
            return Err(DeviceError::Unreachable(device.address.clone()));
        }
        Ok(self.state(&device.id).unwrap_or(false))
    }

    async fn set_mute(&self, device: &Device, mute: bool) -> DeviceResult<()> {
        self.calls
            .lock()
            .push(ControlCall::Set(device.id.clone(), mute));
        if self.failing_writes.lock().contains(&device.id) {
            return Err(DeviceError::Fault("SetMute rejected".to_string()));
        }
        self.set_state(&device.id, mute);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Discovery
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct MockDiscovery {
    devices: Mutex<Vec<Device>>,
    searches: AtomicUsize,
    fail_search: AtomicBool,
}

impl MockDiscovery {
    pub fn with_devices(devices: Vec<Device>) -> Self {
        Self {
            devices: Mutex::new(devices),
            ..Self::default()
        }
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn set_fail_search(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceDiscovery for MockDiscovery {
    async fn known_devices(&self) -> DiscoveryResult<Vec<Device>> {
        Ok(self.devices.lock().clone())
    }

    async fn trigger_search(&self) -> DiscoveryResult<()> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(DiscoveryError::SearchFailed("socket closed".to_string()));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduler
// ─────────────────────────────────────────────────────────────────────────────

struct OnceEntry {
    name: &'static str,
    delay: Duration,
    handle: TaskHandle,
    task: Option<TaskFuture>,
}

struct RepeatingEntry {
    handle: TaskHandle,
    period: Duration,
    task: RepeatingTask,
}

/// Scheduler that records submissions and only runs them on request.
#[derive(Default)]
pub(crate) struct RecordingScheduler {
    once: Mutex<Vec<OnceEntry>>,
    repeating: Mutex<Vec<RepeatingEntry>>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, name: &'static str) -> TaskHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = TaskHandle::new(id, name, CancellationToken::new());
        if self.shut_down.load(Ordering::SeqCst) {
            handle.cancel();
        }
        handle
    }

    /// Delays of every one-shot submission, in order.
    pub fn once_delays(&self) -> Vec<Duration> {
        self.once.lock().iter().map(|e| e.delay).collect()
    }

    pub fn once_names(&self) -> Vec<&'static str> {
        self.once.lock().iter().map(|e| e.name).collect()
    }

    pub fn once_handles(&self) -> Vec<TaskHandle> {
        self.once.lock().iter().map(|e| e.handle.clone()).collect()
    }

    pub fn repeating_handles(&self) -> Vec<TaskHandle> {
        self.repeating.lock().iter().map(|e| e.handle.clone()).collect()
    }

    pub fn repeating_periods(&self) -> Vec<Duration> {
        self.repeating.lock().iter().map(|e| e.period).collect()
    }

    /// Runs the one-shot task at `index`, ignoring cancellation.
    ///
    /// Models a firing that was already executing when it was cancelled.
    /// Returns false if the task was already run.
    pub async fn force_run_once(&self, index: usize) -> bool {
        let task = self.once.lock().get_mut(index).and_then(|e| e.task.take());
        match task {
            Some(task) => {
                task.await;
                true
            }
            None => false,
        }
    }

    /// Runs every one-shot task that is neither cancelled nor already run.
    pub async fn run_due_once(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = {
                let mut once = self.once.lock();
                once.iter_mut()
                    .find(|e| e.task.is_some() && !e.handle.is_cancelled())
                    .and_then(|e| e.task.take())
            };
            match next {
                Some(task) => {
                    task.await;
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Runs one iteration of every live repeating task.
    pub async fn tick_repeating(&self) -> usize {
        let tasks: Vec<RepeatingTask> = self
            .repeating
            .lock()
            .iter()
            .filter(|e| !e.handle.is_cancelled())
            .map(|e| e.task.clone())
            .collect();
        let count = tasks.len();
        for task in tasks {
            task().await;
        }
        count
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule_once(&self, name: &'static str, delay: Duration, task: TaskFuture) -> TaskHandle {
        let handle = self.handle(name);
        self.once.lock().push(OnceEntry {
            name,
            delay,
            handle: handle.clone(),
            task: Some(task),
        });
        handle
    }

    fn schedule_repeating(
        &self,
        name: &'static str,
        _initial_delay: Duration,
        period: Duration,
        task: RepeatingTask,
    ) -> TaskHandle {
        let handle = self.handle(name);
        self.repeating.lock().push(RepeatingEntry {
            handle: handle.clone(),
            period,
            task,
        });
        handle
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        for entry in self.once.lock().iter() {
            entry.handle.cancel();
        }
        for entry in self.repeating.lock().iter() {
            entry.handle.cancel();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Test emitter that counts events and keeps session events.
#[derive(Default)]
pub(crate) struct CountingEventEmitter {
    sessions: Mutex<Vec<SessionEvent>>,
    devices: Mutex<Vec<DeviceEvent>>,
    network_count: AtomicUsize,
}

impl CountingEventEmitter {
    pub fn session_events(&self) -> Vec<SessionEvent> {
        self.sessions.lock().clone()
    }

    pub fn tick_count(&self) -> usize {
        self.sessions
            .lock()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Tick { .. }))
            .count()
    }

    pub fn device_events(&self) -> Vec<DeviceEvent> {
        self.devices.lock().clone()
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn network_count(&self) -> usize {
        self.network_count.load(Ordering::SeqCst)
    }
}

impl EventEmitter for CountingEventEmitter {
    fn emit_session(&self, event: SessionEvent) {
        self.sessions.lock().push(event);
    }

    fn emit_device(&self, event: DeviceEvent) {
        self.devices.lock().push(event);
    }

    fn emit_network(&self, _event: NetworkEvent) {
        self.network_count.fetch_add(1, Ordering::SeqCst);
    }
}
