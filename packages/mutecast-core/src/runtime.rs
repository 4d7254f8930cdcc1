//! Delayed and periodic task scheduling.
//!
//! This module provides the [`Scheduler`] trait used by the mute controller
//! (unmute timer, UI tick) and the discovery retry policy (retry timer), plus
//! [`TokioScheduler`], its implementation on top of a Tokio runtime handle.
//!
//! # Cancellation semantics
//!
//! Cancelling a [`TaskHandle`] is non-blocking and best effort. A task that
//! is still waiting for its delay never runs; a task whose body has already
//! started is left to finish. Task bodies must therefore tolerate running
//! after the reason they were scheduled for has gone away.
//!
//! # Fault handling
//!
//! A panic inside a task body is caught at the scheduler boundary and logged;
//! it never takes down a worker or the process. Submissions made after
//! [`Scheduler::shutdown`] are rejected: they are logged and an already
//! cancelled handle is returned.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

/// A one-shot task body.
pub type TaskFuture = BoxFuture<'static, ()>;

/// A periodic task: called once per period to produce that run's body.
pub type RepeatingTask = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Cancellable handle to a scheduled task.
///
/// Cloning the handle does not clone the task; all clones cancel the same task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    name: &'static str,
    token: CancellationToken,
}

impl TaskHandle {
    /// Creates a handle for a task controlled by `token`.
    pub fn new(id: u64, name: &'static str, token: CancellationToken) -> Self {
        Self { id, name, token }
    }

    /// Scheduler-assigned task id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name given at scheduling time (for logging).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Cancels the task. Never blocks and never interrupts a running body.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once the task has been cancelled (or was rejected).
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Abstraction over a delayed/periodic task executor.
///
/// Implementations must run tasks on a pool of at least two workers so that
/// a long-running body cannot starve another scheduled task.
pub trait Scheduler: Send + Sync {
    /// Runs `task` once after `delay`.
    fn schedule_once(&self, name: &'static str, delay: Duration, task: TaskFuture) -> TaskHandle;

    /// Runs `task` after `initial_delay` and then every `period`.
    fn schedule_repeating(
        &self,
        name: &'static str,
        initial_delay: Duration,
        period: Duration,
        task: RepeatingTask,
    ) -> TaskHandle;

    /// Cancels a scheduled task (non-blocking, best effort).
    fn cancel(&self, handle: &TaskHandle) {
        handle.cancel();
    }

    /// Cancels every pending and periodic task and rejects new submissions.
    fn shutdown(&self);
}

/// Tokio-based scheduler.
///
/// Spawns every task onto the given runtime handle. For production use the
/// handle comes from a [`SchedulerRuntime`](crate::scheduler_runtime::SchedulerRuntime),
/// which guarantees the worker count; tests use the current runtime so that
/// paused time drives the timers.
pub struct TokioScheduler {
    handle: Handle,
    /// Parent of every task token; cancelled on shutdown.
    shutdown: CancellationToken,
    next_id: AtomicU64,
}

impl TokioScheduler {
    /// Creates a new `TokioScheduler` spawning onto the given runtime handle.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            shutdown: CancellationToken::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a new `TokioScheduler` using the current runtime's handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Returns true once [`Scheduler::shutdown`] has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Allocates a handle for a new task, or a pre-cancelled one if rejected.
    fn register(&self, name: &'static str) -> Result<TaskHandle, TaskHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = TaskHandle::new(id, name, self.shutdown.child_token());
        if self.is_shut_down() {
            log::error!(
                "[Scheduler] Could not schedule task '{}' (#{}): scheduler is shut down",
                name,
                id
            );
            handle.cancel();
            return Err(handle);
        }
        Ok(handle)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, name: &'static str, delay: Duration, task: TaskFuture) -> TaskHandle {
        let handle = match self.register(name) {
            Ok(handle) => handle,
            Err(rejected) => return rejected,
        };

        let token = handle.token.clone();
        let id = handle.id;
        log::trace!("[Scheduler] '{}' (#{}) due in {:?}", name, id, delay);

        self.handle.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    log::trace!("[Scheduler] '{}' (#{}) cancelled before firing", name, id);
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            run_guarded(name, id, task).await;
        });

        handle
    }

    fn schedule_repeating(
        &self,
        name: &'static str,
        initial_delay: Duration,
        period: Duration,
        task: RepeatingTask,
    ) -> TaskHandle {
        if period.is_zero() {
            log::error!("[Scheduler] Rejected '{}': period must be non-zero", name);
            let rejected = TaskHandle::new(0, name, CancellationToken::new());
            rejected.cancel();
            return rejected;
        }

        let handle = match self.register(name) {
            Ok(handle) => handle,
            Err(rejected) => return rejected,
        };

        let token = handle.token.clone();
        let id = handle.id;

        self.handle.spawn(async move {
            let start = tokio::time::Instant::now() + initial_delay;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                run_guarded(name, id, task()).await;
            }
            log::trace!("[Scheduler] Repeating '{}' (#{}) stopped", name, id);
        });

        handle
    }

    fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            log::info!("[Scheduler] Shutting down, cancelling all scheduled tasks");
            self.shutdown.cancel();
        }
    }
}

/// Runs a task body, logging instead of propagating a panic.
async fn run_guarded(name: &'static str, id: u64, task: TaskFuture) {
    if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
        log::error!(
            "[Scheduler] Task '{}' (#{}) panicked: {}",
            name,
            id,
            panic_message(panic.as_ref())
        );
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
