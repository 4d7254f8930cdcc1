//! Session bootstrap and dependency wiring.
//!
//! This module contains the composition root: the single place where every
//! service of a mute session is instantiated and wired together, and where
//! the whole set is torn down again.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::device::{DeviceControl, DeviceDiscovery, DeviceRegistry};
use crate::error::{MutecastError, MutecastResult};
use crate::events::{BroadcastEventBridge, EventEmitter};
use crate::protocol_constants::APP_NAME;
use crate::runtime::{Scheduler, TokioScheduler};
use crate::scheduler_runtime::SchedulerRuntime;
use crate::services::{
    DiscoveryEvent, DiscoveryEventProcessor, DiscoveryRetryPolicy, MuteController, MuteTimings,
};
use crate::state::{Config, ConnectivityState};

/// Container for all services of a mute session.
///
/// Lives for the whole process: built at start, torn down by [`MuteSession::shutdown`].
pub struct MuteSession {
    /// The mute/unmute state machine.
    pub controller: Arc<MuteController>,
    /// Devices currently believed reachable.
    pub registry: Arc<DeviceRegistry>,
    /// Discovery retry backoff.
    pub retry_policy: Arc<DiscoveryRetryPolicy>,
    /// Event fan-out to observers; set an external emitter here for UI delivery.
    pub event_bridge: Arc<BroadcastEventBridge>,
    /// Connectivity flag, written by the event loop.
    pub connectivity: ConnectivityState,
    processor: Arc<DiscoveryEventProcessor>,
    discovery: Arc<dyn DeviceDiscovery>,
    scheduler: Arc<dyn Scheduler>,
    event_tx: mpsc::Sender<DiscoveryEvent>,
    handle: Handle,
    /// Dedicated runtime, absent when the session runs on a caller-supplied handle.
    runtime: Option<SchedulerRuntime>,
    cancel_token: CancellationToken,
}

impl MuteSession {
    /// Starts the event loop and populates the registry.
    ///
    /// Enumerates the devices the discovery layer already knows, then triggers
    /// one fresh search. Discovery errors are logged, not returned.
    ///
    /// Returns the number of devices in the registry after population.
    pub async fn start(&self) -> usize {
        let processor = Arc::clone(&self.processor);
        let token = self.cancel_token.clone();
        self.handle.spawn(async move { processor.run(token).await });

        match self.discovery.known_devices().await {
            Ok(devices) => {
                for device in devices {
                    self.processor
                        .process_event(DiscoveryEvent::Appeared { device });
                }
            }
            Err(e) => log::warn!("[Session] Could not enumerate known devices: {}", e),
        }

        if let Err(e) = self.discovery.trigger_search().await {
            log::warn!("[Session] Initial discovery search failed: {}", e);
        }

        let count = self.registry.len();
        log::info!("[Session] {} started with {} device(s)", APP_NAME, count);
        count
    }

    /// Returns a sender for discovery and connectivity events.
    pub fn event_sender(&self) -> mpsc::Sender<DiscoveryEvent> {
        self.event_tx.clone()
    }

    /// Stops the session.
    ///
    /// Stops the event loop, cancels every scheduled task (a pending unmute is
    /// dropped), forgets all devices and stops the dedicated runtime.
    pub fn shutdown(&mut self) {
        if self.cancel_token.is_cancelled() {
            return;
        }
        log::info!("[Session] Beginning shutdown...");

        self.cancel_token.cancel();
        self.scheduler.shutdown();
        self.registry.clear();

        if let Some(mut runtime) = self.runtime.take() {
            runtime.shutdown();
        }

        log::info!("[Session] Shutdown complete");
    }
}

impl Drop for MuteSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bootstraps a session on its own dedicated scheduler runtime.
///
/// May be called from synchronous or async code. It briefly blocks the calling
/// thread while the scheduler runtime starts.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the scheduler runtime
/// fails to start.
pub fn bootstrap_session(
    config: &Config,
    control: Arc<dyn DeviceControl>,
    discovery: Arc<dyn DeviceDiscovery>,
) -> MutecastResult<MuteSession> {
    config.validate()?;

    let runtime = SchedulerRuntime::new(config.scheduler_worker_threads).map_err(|e| {
        MutecastError::Scheduler(format!("Failed to create scheduler runtime: {}", e))
    })?;
    let handle = runtime.handle().clone();

    Ok(wire(config, control, discovery, handle, Some(runtime)))
}

/// Bootstraps a session that schedules onto an existing runtime.
///
/// The caller guarantees the runtime has enough workers.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub fn bootstrap_session_with_handle(
    config: &Config,
    control: Arc<dyn DeviceControl>,
    discovery: Arc<dyn DeviceDiscovery>,
    handle: Handle,
) -> MutecastResult<MuteSession> {
    config.validate()?;
    Ok(wire(config, control, discovery, handle, None))
}

/// Wires services in dependency order:
///
/// 1. Scheduler (on the given runtime handle)
/// 2. Shared state (registry, connectivity, event bridge)
/// 3. Retry policy (depends on scheduler, discovery)
/// 4. Event processor (depends on registry, connectivity, retry policy)
/// 5. Mute controller (depends on registry, connectivity, control, scheduler)
fn wire(
    config: &Config,
    control: Arc<dyn DeviceControl>,
    discovery: Arc<dyn DeviceDiscovery>,
    handle: Handle,
    runtime: Option<SchedulerRuntime>,
) -> MuteSession {
    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::new(handle.clone()));

    let registry = Arc::new(DeviceRegistry::new());
    let connectivity = ConnectivityState::default();
    let event_bridge = Arc::new(BroadcastEventBridge::new(config.event_channel_capacity));
    let emitter = Arc::clone(&event_bridge) as Arc<dyn EventEmitter>;

    let retry_policy = Arc::new(DiscoveryRetryPolicy::new(
        Arc::clone(&scheduler),
        Arc::clone(&discovery),
        config.retry.clone(),
        config.target_family_marker.clone(),
    ));

    let (event_tx, event_rx) = mpsc::channel(config.discovery_event_capacity);
    let processor = Arc::new(DiscoveryEventProcessor::new(
        Arc::clone(&registry),
        connectivity.clone(),
        Arc::clone(&retry_policy),
        Arc::clone(&emitter),
        config.target_family_marker.clone(),
        event_rx,
    ));

    let controller = Arc::new(MuteController::new(
        Arc::clone(&registry),
        connectivity.clone(),
        control,
        Arc::clone(&scheduler),
        emitter,
        MuteTimings::from(config),
    ));

    MuteSession {
        controller,
        registry,
        retry_policy,
        event_bridge,
        connectivity,
        processor,
        discovery,
        scheduler,
        event_tx,
        handle,
        runtime,
        cancel_token: CancellationToken::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use crate::events::{BroadcastEvent, SessionEvent};
    use crate::services::{ExtendOutcome, MuteState};
    use crate::test_fixtures::{device, MockDeviceControl, MockDiscovery};
    use std::time::Duration;

    fn mocks() -> (Arc<MockDeviceControl>, Arc<MockDiscovery>) {
        let control = Arc::new(MockDeviceControl::new());
        control.set_state("A", false);
        control.set_state("B", true);
        let discovery = Arc::new(MockDiscovery::with_devices(vec![
            device("A"),
            device("B"),
            Device::new("tv", "Living Room TV", "192.168.1.50"),
        ]));
        (control, discovery)
    }

    async fn wait_until_connected(session: &MuteSession) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !session.connectivity.is_connected() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn start_populates_target_devices_and_searches() {
        let (control, discovery) = mocks();
        let session = bootstrap_session_with_handle(
            &Config::default(),
            control,
            discovery.clone(),
            Handle::current(),
        )
        .unwrap();

        assert_eq!(session.start().await, 2);
        assert_eq!(discovery.search_count(), 1);
        assert!(session.registry.get("tv").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn full_mute_cycle_through_session() {
        let (control, discovery) = mocks();
        let mut session = bootstrap_session_with_handle(
            &Config::default(),
            control.clone(),
            discovery,
            Handle::current(),
        )
        .unwrap();
        let mut events = session.event_bridge.subscribe();
        session.start().await;

        assert_eq!(
            session.controller.current_state().await,
            MuteState::NoNetwork
        );

        session
            .event_sender()
            .send(DiscoveryEvent::ConnectivityChanged { connected: true })
            .await
            .unwrap();
        wait_until_connected(&session).await;

        let outcome = session.controller.request_extend_mute().await;
        assert!(matches!(
            outcome,
            ExtendOutcome::Muted {
                device_count: 2,
                ..
            }
        ));
        assert_eq!(control.state("A"), Some(true));

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(control.state("A"), Some(false));
        assert_eq!(control.state("B"), Some(true));

        let mut saw_end = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, BroadcastEvent::Session(SessionEvent::Ended { .. })) {
                saw_end = true;
            }
        }
        assert!(saw_end);

        session.shutdown();
        assert!(session.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_pending_unmute() {
        let (control, discovery) = mocks();
        let mut session = bootstrap_session_with_handle(
            &Config::default(),
            control.clone(),
            discovery,
            Handle::current(),
        )
        .unwrap();
        session.start().await;
        session.connectivity.set(true);

        session.controller.request_extend_mute().await;
        session.shutdown();
        tokio::time::sleep(Duration::from_secs(20)).await;

        // Left muted: the pending unmute never ran
        assert_eq!(control.state("A"), Some(true));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (control, discovery) = mocks();
        let config = Config {
            scheduler_worker_threads: 1,
            ..Config::default()
        };

        let result = bootstrap_session(&config, control, discovery);
        assert!(matches!(result, Err(MutecastError::Configuration(_))));
    }

    #[test]
    fn dedicated_runtime_session_starts_and_stops() {
        let (control, discovery) = mocks();
        let mut session = bootstrap_session(&Config::default(), control, discovery).unwrap();

        let host = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        assert_eq!(host.block_on(session.start()), 2);

        session.shutdown();
        session.shutdown();
        assert!(session.registry.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dedicated_runtime_session_bootstraps_inside_host_runtime() {
        let (control, discovery) = mocks();
        let mut session = bootstrap_session(&Config::default(), control, discovery.clone())
            .expect("bootstrap from async code");

        assert_eq!(session.start().await, 2);
        assert_eq!(discovery.search_count(), 1);

        session.shutdown();
        assert!(session.registry.is_empty());
    }
}
