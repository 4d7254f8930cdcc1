//! Discovery event processing service.
//!
//! Responsibilities:
//! - Consuming the discovery layer's events from a single channel
//! - Keeping the device registry and connectivity flag current
//! - Handing target-family failures to the retry policy
//! - Reporting registry and connectivity changes to observers

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::device::{is_target_family, Device, DeviceRegistry};
use crate::events::{DeviceEvent, EventEmitter, NetworkEvent};
use crate::services::discovery_retry::DiscoveryRetryPolicy;
use crate::state::ConnectivityState;
use crate::utils::now_millis;

/// Inbound events from the discovery layer and the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A device was found (or re-announced).
    Appeared { device: Device },
    /// A device went away cleanly.
    Disappeared { id: String },
    /// A device could not be reached or resolved.
    Failed { id: String, display_name: String },
    /// The host's network connectivity changed.
    ConnectivityChanged { connected: bool },
}

/// Applies discovery events to the registry, connectivity flag and retry policy.
pub struct DiscoveryEventProcessor {
    registry: Arc<DeviceRegistry>,
    connectivity: ConnectivityState,
    retry_policy: Arc<DiscoveryRetryPolicy>,
    emitter: Arc<dyn EventEmitter>,
    marker: String,
    event_rx: Arc<Mutex<Option<mpsc::Receiver<DiscoveryEvent>>>>,
}

impl DiscoveryEventProcessor {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        connectivity: ConnectivityState,
        retry_policy: Arc<DiscoveryRetryPolicy>,
        emitter: Arc<dyn EventEmitter>,
        marker: impl Into<String>,
        event_rx: mpsc::Receiver<DiscoveryEvent>,
    ) -> Self {
        Self {
            registry,
            connectivity,
            retry_policy,
            emitter,
            marker: marker.into(),
            event_rx: Arc::new(Mutex::new(Some(event_rx))),
        }
    }

    /// Applies a single event.
    pub fn process_event(&self, event: DiscoveryEvent) {
        match event {
            DiscoveryEvent::Appeared { device } => {
                if !is_target_family(&device.name, &self.marker) {
                    log::debug!("[DiscoveryEvents] Ignoring non-target device {}", device);
                    return;
                }
                log::info!("[DiscoveryEvents] Device added: {}", device);
                self.emitter.emit_device(DeviceEvent::Added {
                    device_id: device.id.clone(),
                    name: device.name.clone(),
                    timestamp: now_millis(),
                });
                self.registry.add(device.id.clone(), device);
            }
            DiscoveryEvent::Disappeared { id } => {
                self.remove_device(&id);
            }
            DiscoveryEvent::Failed { id, display_name } => {
                log::warn!(
                    "[DiscoveryEvents] Discovery failed for {} ({})",
                    display_name,
                    id
                );
                self.remove_device(&id);
                self.retry_policy.on_discovery_failed(&id, &display_name);
            }
            DiscoveryEvent::ConnectivityChanged { connected } => {
                let previous = self.connectivity.set(connected);
                log::info!(
                    "[DiscoveryEvents] Connectivity changed: {} -> {}",
                    previous,
                    connected
                );
                self.emitter.emit_network(NetworkEvent::ConnectivityChanged {
                    connected,
                    timestamp: now_millis(),
                });
            }
        }
    }

    fn remove_device(&self, id: &str) {
        if self.registry.remove(id) {
            log::info!("[DiscoveryEvents] Device removed: {}", id);
            self.emitter.emit_device(DeviceEvent::Removed {
                device_id: id.to_string(),
                timestamp: now_millis(),
            });
        }
    }

    /// Consumes events until the channel closes or `cancel` fires.
    ///
    /// The receiver can only be taken once; a second call returns immediately.
    pub async fn run(&self, cancel: CancellationToken) {
        let rx = self.event_rx.lock().take();
        let Some(mut rx) = rx else {
            log::warn!("[DiscoveryEvents] Event loop already started");
            return;
        };

        log::debug!("[DiscoveryEvents] Event loop started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => self.process_event(event),
                    None => break,
                },
            }
        }
        log::debug!("[DiscoveryEvents] Event loop stopped");
    }
}
