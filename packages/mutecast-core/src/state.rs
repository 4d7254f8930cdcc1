//! Configuration and shared runtime state.
//!
//! [`Config`] carries every tunable of a mute session. All fields have defaults
//! equal to the constants in [`protocol_constants`](crate::protocol_constants),
//! so an empty JSON object (or no file at all) yields the standard timings.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MutecastError, MutecastResult};
use crate::protocol_constants::{
    DEFAULT_RETRY_DISCOVERY_DELAY, DEVICE_CALL_TIMEOUT, DISCOVERY_EVENT_CHANNEL_CAPACITY,
    EVENT_CHANNEL_CAPACITY, MAX_MUTE_LENGTH, MUTE_LENGTH, RETRY_BACKOFF_MULTIPLIER,
    RETRY_QUIET_RESET, SCHEDULER_WORKER_THREADS, TARGET_FAMILY_MARKER, UI_TICK_PERIOD,
};
use crate::utils::duration_to_millis;

/// Environment variable overriding [`Config::target_family_marker`].
pub const ENV_TARGET_FAMILY: &str = "MUTECAST_TARGET_FAMILY";

/// Environment variable overriding [`Config::mute_increment_ms`].
pub const ENV_MUTE_INCREMENT_MS: &str = "MUTECAST_MUTE_INCREMENT_MS";

/// Configuration for discovery retry backoff.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry after a quiet period (milliseconds).
    pub initial_delay_ms: u64,

    /// Quiet period after which the delay resets to `initial_delay_ms` (milliseconds).
    pub quiet_reset_ms: u64,

    /// Factor applied to the delay after every scheduled retry.
    pub multiplier: u32,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn quiet_reset(&self) -> Duration {
        Duration::from_millis(self.quiet_reset_ms)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_delay_ms == 0 {
            return Err("retry.initial_delay_ms must be >= 1".to_string());
        }
        if self.quiet_reset_ms == 0 {
            return Err("retry.quiet_reset_ms must be >= 1".to_string());
        }
        if self.multiplier == 0 {
            return Err("retry.multiplier must be >= 1".to_string());
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: duration_to_millis(DEFAULT_RETRY_DISCOVERY_DELAY),
            quiet_reset_ms: duration_to_millis(RETRY_QUIET_RESET),
            multiplier: RETRY_BACKOFF_MULTIPLIER,
        }
    }
}

/// Configuration for a mute session.
///
/// All fields have defaults; durations are in milliseconds.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    // Mute session
    /// Time added to the deadline by each mute request.
    pub mute_increment_ms: u64,

    /// Ceiling on the remaining mute time.
    pub max_mute_length_ms: u64,

    /// Period of the UI tick while muted.
    pub ui_tick_interval_ms: u64,

    /// Bound on a single device get/set mute call.
    pub device_call_timeout_ms: u64,

    // Discovery
    /// Substring of a display name marking a controllable device.
    pub target_family_marker: String,

    /// Discovery retry backoff.
    pub retry: RetryConfig,

    // Runtime
    /// Worker threads of the scheduler runtime (at least 2).
    pub scheduler_worker_threads: usize,

    /// Capacity of the inbound discovery event channel.
    pub discovery_event_capacity: usize,

    /// Capacity of the event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mute_increment_ms: duration_to_millis(MUTE_LENGTH),
            max_mute_length_ms: duration_to_millis(MAX_MUTE_LENGTH),
            ui_tick_interval_ms: duration_to_millis(UI_TICK_PERIOD),
            device_call_timeout_ms: duration_to_millis(DEVICE_CALL_TIMEOUT),
            target_family_marker: TARGET_FAMILY_MARKER.to_string(),
            retry: RetryConfig::default(),
            scheduler_worker_threads: SCHEDULER_WORKER_THREADS,
            discovery_event_capacity: DISCOVERY_EVENT_CHANNEL_CAPACITY,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Loads configuration from a JSON file, then applies environment overrides.
    ///
    /// Missing fields take their defaults. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`MutecastError::Configuration`] if the file cannot be read or
    /// parsed, or if the resulting values are invalid.
    pub fn load(path: Option<&Path>) -> MutecastResult<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path).map_err(|e| {
                MutecastError::Configuration(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                MutecastError::Configuration(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from a key lookup (the process environment in [`Config::load`]).
    ///
    /// Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(marker) = lookup(ENV_TARGET_FAMILY) {
            self.target_family_marker = marker;
        }

        if let Some(val) = lookup(ENV_MUTE_INCREMENT_MS) {
            if let Ok(ms) = val.parse() {
                self.mute_increment_ms = ms;
            }
        }
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`MutecastError::Configuration`] naming the first invalid field.
    pub fn validate(&self) -> MutecastResult<()> {
        self.check().map_err(MutecastError::Configuration)
    }

    fn check(&self) -> Result<(), String> {
        if self.mute_increment_ms == 0 {
            return Err("mute_increment_ms must be >= 1".to_string());
        }
        if self.max_mute_length_ms < self.mute_increment_ms {
            return Err("max_mute_length_ms must be >= mute_increment_ms".to_string());
        }
        if self.ui_tick_interval_ms == 0 {
            return Err("ui_tick_interval_ms must be >= 1".to_string());
        }
        if self.device_call_timeout_ms == 0 {
            return Err("device_call_timeout_ms must be >= 1".to_string());
        }
        if self.target_family_marker.is_empty() {
            return Err("target_family_marker must not be empty".to_string());
        }
        if self.scheduler_worker_threads < SCHEDULER_WORKER_THREADS {
            return Err(format!(
                "scheduler_worker_threads must be >= {}",
                SCHEDULER_WORKER_THREADS
            ));
        }
        if self.discovery_event_capacity == 0 {
            return Err("discovery_event_capacity must be >= 1".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".to_string(),
            );
        }
        self.retry.validate()
    }

    pub fn mute_increment(&self) -> Duration {
        Duration::from_millis(self.mute_increment_ms)
    }

    pub fn max_mute_length(&self) -> Duration {
        Duration::from_millis(self.max_mute_length_ms)
    }

    pub fn ui_tick_interval(&self) -> Duration {
        Duration::from_millis(self.ui_tick_interval_ms)
    }

    pub fn device_call_timeout(&self) -> Duration {
        Duration::from_millis(self.device_call_timeout_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connectivity
// ─────────────────────────────────────────────────────────────────────────────

/// Shared network connectivity flag.
///
/// Written only by connectivity events, read by the mute controller.
/// Starts disconnected until the host reports otherwise.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityState {
    connected: Arc<AtomicBool>,
}

impl ConnectivityState {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(connected)),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Stores the new value and returns the previous one.
    pub fn set(&self, connected: bool) -> bool {
        self.connected.swap(connected, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_match_protocol_constants() {
        let config = Config::default();
        assert_eq!(config.mute_increment(), Duration::from_secs(10));
        assert_eq!(config.max_mute_length(), Duration::from_secs(599));
        assert_eq!(config.ui_tick_interval(), Duration::from_secs(1));
        assert_eq!(config.retry.initial_delay(), Duration::from_secs(10));
        assert_eq!(config.retry.quiet_reset(), Duration::from_secs(3600));
        assert_eq!(config.retry.multiplier, 2);
        assert_eq!(config.target_family_marker, "Sonos");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"mute_increment_ms": 5000, "retry": {"multiplier": 3}}"#)
                .unwrap();
        assert_eq!(config.mute_increment_ms, 5000);
        assert_eq!(config.max_mute_length_ms, 599_000);
        assert_eq!(config.retry.multiplier, 3);
        assert_eq!(config.retry.initial_delay_ms, 10_000);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cases: Vec<(&str, Box<dyn Fn(&mut Config)>)> = vec![
            ("mute_increment_ms", Box::new(|c| c.mute_increment_ms = 0)),
            ("max_mute_length_ms", Box::new(|c| c.max_mute_length_ms = 1)),
            ("ui_tick_interval_ms", Box::new(|c| c.ui_tick_interval_ms = 0)),
            ("target_family_marker", Box::new(|c| c.target_family_marker.clear())),
            ("scheduler_worker_threads", Box::new(|c| c.scheduler_worker_threads = 1)),
            ("event_channel_capacity", Box::new(|c| c.event_channel_capacity = 0)),
            ("retry.multiplier", Box::new(|c| c.retry.multiplier = 0)),
        ];

        for (field, mutate) in cases {
            let mut config = Config::default();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(field), "{field}: {err}");
        }
    }

    #[test]
    fn load_reads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"ui_tick_interval_ms": 500}}"#).unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.ui_tick_interval(), Duration::from_millis(500));
    }

    #[test]
    fn load_reports_parse_and_validation_errors() {
        let mut bad_json = tempfile::NamedTempFile::new().unwrap();
        write!(bad_json, "not json").unwrap();
        let err = Config::load(Some(bad_json.path())).unwrap_err();
        assert!(matches!(err, MutecastError::Configuration(_)));

        let mut invalid = tempfile::NamedTempFile::new().unwrap();
        write!(invalid, r#"{{"scheduler_worker_threads": 1}}"#).unwrap();
        let err = Config::load(Some(invalid.path())).unwrap_err();
        assert!(err.to_string().contains("scheduler_worker_threads"));
    }

    #[test]
    fn load_missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.json"))).unwrap_err();
        assert!(matches!(err, MutecastError::Configuration(_)));
    }

    #[test]
    fn overrides_apply_and_ignore_garbage() {
        let env: HashMap<&str, &str> = [
            (ENV_TARGET_FAMILY, "Bose"),
            (ENV_MUTE_INCREMENT_MS, "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.target_family_marker, "Bose");
        assert_eq!(config.mute_increment_ms, 10_000);
    }

    #[test]
    fn connectivity_set_returns_previous_value() {
        let state = ConnectivityState::default();
        assert!(!state.is_connected());
        assert!(!state.set(true));
        assert!(state.clone().is_connected());
        assert!(state.set(false));
    }
}
