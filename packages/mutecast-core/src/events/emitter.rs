//! Event emitter abstraction for decoupling services from observers.
//!
//! Services depend on the [`EventEmitter`] trait rather than concrete broadcast
//! channels, enabling testing and alternative delivery (UI, logs, IPC).

use super::{DeviceEvent, NetworkEvent, SessionEvent};

/// Trait for emitting domain events without knowledge of delivery.
///
/// Implementations must be cheap and must not block: emitters are invoked
/// while the mute controller lock is held.
///
/// # Example
///
/// ```ignore
/// struct MyService {
///     emitter: Arc<dyn EventEmitter>,
/// }
///
/// impl MyService {
///     fn do_something(&self) {
///         self.emitter.emit_network(NetworkEvent::ConnectivityChanged { ... });
///     }
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits a mute session event.
    fn emit_session(&self, event: SessionEvent);

    /// Emits a device registry event.
    fn emit_device(&self, event: DeviceEvent);

    /// Emits a connectivity event.
    fn emit_network(&self, event: NetworkEvent);
}

/// No-op emitter for headless use or testing.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_session(&self, _event: SessionEvent) {}

    fn emit_device(&self, _event: DeviceEvent) {}

    fn emit_network(&self, _event: NetworkEvent) {}
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_session(&self, event: SessionEvent) {
        tracing::debug!(?event, "session_event");
    }

    fn emit_device(&self, event: DeviceEvent) {
        tracing::debug!(?event, "device_event");
    }

    fn emit_network(&self, event: NetworkEvent) {
        tracing::debug!(?event, "network_event");
    }
}
