//! Dedicated runtime for mute-session timers.
//!
//! The unmute timer and the UI tick run on their own multi-threaded Tokio
//! executor, hosted on a dedicated OS thread and isolated from whatever
//! runtime the embedding application uses. The pool always has at least
//! [`SCHEDULER_WORKER_THREADS`] workers, so one slow device call inside an
//! unmute cannot delay the tick (or the other way round).

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tokio::runtime::{Builder, Handle};
use tokio_util::sync::CancellationToken;

use crate::protocol_constants::SCHEDULER_WORKER_THREADS;

/// A dedicated runtime backing the [`TokioScheduler`](crate::runtime::TokioScheduler).
pub struct SchedulerRuntime {
    /// Handle to spawn tasks on the scheduler runtime.
    handle: Handle,
    /// Cancellation token for graceful shutdown.
    cancel: CancellationToken,
    /// Thread join handle for cleanup (None after shutdown).
    thread: Option<JoinHandle<()>>,
}

impl SchedulerRuntime {
    /// Creates a new scheduler runtime with `worker_threads` workers.
    ///
    /// Values below [`SCHEDULER_WORKER_THREADS`] are raised to it. Blocks the
    /// calling thread until the runtime is up. Safe to call from async code.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime thread fails to spawn or the runtime
    /// fails to build.
    pub fn new(worker_threads: usize) -> std::io::Result<Self> {
        let workers = worker_threads.max(SCHEDULER_WORKER_THREADS);
        let (tx, rx) = mpsc::channel::<std::io::Result<Handle>>();
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        let thread = thread::Builder::new()
            .name("mutecast-scheduler".into())
            .spawn(move || {
                let runtime = match Builder::new_multi_thread()
                    .worker_threads(workers)
                    .thread_name("mutecast-worker")
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                };

                if tx.send(Ok(runtime.handle().clone())).is_err() {
                    log::error!("[SchedulerRuntime] Failed to send runtime handle");
                    return;
                }

                // Block until shutdown is requested
                runtime.block_on(async {
                    cancel_clone.cancelled().await;
                    log::info!("[SchedulerRuntime] Shutting down");
                });

                // Runtime drops here, stopping all workers
            })?;

        let handle = rx
            .recv()
            .map_err(|_| std::io::Error::other("Failed to receive scheduler runtime handle"))??;

        log::info!("[SchedulerRuntime] Started with {} worker threads", workers);

        Ok(Self {
            handle,
            cancel,
            thread: Some(thread),
        })
    }

    /// Returns a handle for spawning tasks on the scheduler runtime.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Stops the runtime and waits for its thread to exit.
    ///
    /// Tasks still pending on the runtime are dropped without running.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();

        if let Some(thread) = self.thread.take() {
            if let Err(e) = thread.join() {
                log::error!("[SchedulerRuntime] Runtime thread panicked: {:?}", e);
            } else {
                log::info!("[SchedulerRuntime] Shutdown complete");
            }
        }
    }
}

impl Drop for SchedulerRuntime {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown();
        }
    }
}
