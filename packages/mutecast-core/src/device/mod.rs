//! Device model, registry and transport abstractions.
//!
//! # Module Structure
//!
//! - `types` - Domain types for devices
//! - `traits` - Trait abstractions for the external discovery/control transport
//! - `registry` - Thread-safe registry of reachable devices

pub mod registry;
pub mod traits;
pub mod types;

pub use registry::DeviceRegistry;
pub use traits::{DeviceControl, DeviceDiscovery};
pub use types::{is_target_family, Device};
