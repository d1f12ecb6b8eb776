//! Runtime configuration for the locker controller.
//!
//! All durations are stored in milliseconds so the JSON form stays readable;
//! accessors hand out [`Duration`] values. Every field has a default taken
//! from [`constants`](crate::constants), so a partial file is enough:
//!
//! ```
//! use bikelocker_core::LockerConfig;
//! use std::time::Duration;
//!
//! let config = LockerConfig::from_json_str(r#"{ "interlock": { "timeout_ms": 5000 } }"#).unwrap();
//! assert_eq!(config.interlock.timeout(), Duration::from_secs(5));
//! assert_eq!(config.interlock.poll_interval(), Duration::from_millis(100));
//! ```

use crate::constants::*;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerConfig {
    pub interlock: InterlockConfig,
    pub monitor: MonitorConfig,
    pub nfc: NfcConfig,
    pub simulator: SimulatorConfig,
}

impl LockerConfig {
    /// Parse and validate a JSON document.
    ///
    /// # Errors
    /// Returns `Error::ConfigParse` for malformed JSON and `Error::Config` when
    /// a value fails validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LockerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, otherwise the same
    /// errors as [`from_json_str`](Self::from_json_str).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject values that would make a loop spin or never run.
    ///
    /// # Errors
    /// Returns `Error::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let non_zero = [
            ("interlock.poll_interval_ms", self.interlock.poll_interval_ms),
            ("interlock.timeout_ms", self.interlock.timeout_ms),
            ("nfc.no_tag_backoff_ms", self.nfc.no_tag_backoff_ms),
            ("nfc.poll_timeout_ms", self.nfc.poll_timeout_ms),
            ("simulator.sled_travel_ms", self.simulator.sled_travel_ms),
        ];
        if let Some((field, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(Error::Config(format!("{field} must be greater than zero")));
        }

        if self.interlock.timeout_ms < self.interlock.poll_interval_ms {
            return Err(Error::Config(format!(
                "interlock.timeout_ms ({}) is shorter than interlock.poll_interval_ms ({})",
                self.interlock.timeout_ms, self.interlock.poll_interval_ms
            )));
        }

        if self.nfc.init_attempts == 0 {
            return Err(Error::Config(
                "nfc.init_attempts must be greater than zero".to_string(),
            ));
        }

        if self.monitor.queue_capacity == 0 || self.nfc.command_queue_capacity == 0 {
            return Err(Error::Config(
                "queue capacities must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Interlock wait settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterlockConfig {
    /// Interval between direct switch reads.
    pub poll_interval_ms: u64,

    /// Bound on one wait before the locker faults.
    pub timeout_ms: u64,
}

impl InterlockConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for InterlockConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_INTERLOCK_POLL_MS,
            timeout_ms: DEFAULT_INTERLOCK_TIMEOUT_MS,
        }
    }
}

/// Limit switch monitor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Capacity of the edge notification queue.
    pub queue_capacity: usize,

    /// Pause after each processed notification.
    pub rate_limit_ms: u64,
}

impl MonitorConfig {
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_EDGE_QUEUE_CAPACITY,
            rate_limit_ms: DEFAULT_MONITOR_RATE_LIMIT_MS,
        }
    }
}

/// NFC session driver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NfcConfig {
    /// Reader initialization attempts before the session driver gives up.
    pub init_attempts: u32,

    /// Pause between initialization attempts.
    pub init_retry_ms: u64,

    /// Backoff after a poll without a tag.
    pub no_tag_backoff_ms: u64,

    /// Pause after dispatching a detection.
    pub settle_delay_ms: u64,

    /// Listening window of a single poll.
    pub poll_timeout_ms: u64,

    /// Capacity of the operator command queue.
    pub command_queue_capacity: usize,
}

impl NfcConfig {
    pub fn init_retry(&self) -> Duration {
        Duration::from_millis(self.init_retry_ms)
    }

    pub fn no_tag_backoff(&self) -> Duration {
        Duration::from_millis(self.no_tag_backoff_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for NfcConfig {
    fn default() -> Self {
        Self {
            init_attempts: NFC_INIT_MAX_ATTEMPTS,
            init_retry_ms: DEFAULT_NFC_INIT_RETRY_MS,
            no_tag_backoff_ms: DEFAULT_NFC_NO_TAG_BACKOFF_MS,
            settle_delay_ms: DEFAULT_NFC_SETTLE_DELAY_MS,
            poll_timeout_ms: DEFAULT_NFC_POLL_TIMEOUT_MS,
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
        }
    }
}

/// Plant simulator settings (used by the CLI and tests only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub sled_travel_ms: u64,
    pub door_open_delay_ms: u64,
    pub door_close_delay_ms: u64,
}

impl SimulatorConfig {
    pub fn sled_travel(&self) -> Duration {
        Duration::from_millis(self.sled_travel_ms)
    }

    pub fn door_open_delay(&self) -> Duration {
        Duration::from_millis(self.door_open_delay_ms)
    }

    pub fn door_close_delay(&self) -> Duration {
        Duration::from_millis(self.door_close_delay_ms)
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sled_travel_ms: DEFAULT_SLED_TRAVEL_MS,
            door_open_delay_ms: DEFAULT_DOOR_OPEN_DELAY_MS,
            door_close_delay_ms: DEFAULT_DOOR_CLOSE_DELAY_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = LockerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.nfc.init_attempts, 5);
        assert_eq!(config.nfc.settle_delay(), Duration::from_secs(5));
        assert_eq!(config.monitor.queue_capacity, 10);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            LockerConfig::from_json_str(r#"{ "nfc": { "settle_delay_ms": 1000 } }"#).unwrap();
        assert_eq!(config.nfc.settle_delay_ms, 1000);
        assert_eq!(config.nfc.no_tag_backoff_ms, DEFAULT_NFC_NO_TAG_BACKOFF_MS);
        assert_eq!(config.interlock, InterlockConfig::default());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result = LockerConfig::from_json_str(r#"{ "interlock": { "poll_interval_ms": 0 } }"#);
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("poll_interval_ms")));
    }

    #[test]
    fn test_timeout_shorter_than_poll_rejected() {
        let result = LockerConfig::from_json_str(
            r#"{ "interlock": { "poll_interval_ms": 500, "timeout_ms": 100 } }"#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_init_attempts_rejected() {
        let result = LockerConfig::from_json_str(r#"{ "nfc": { "init_attempts": 0 } }"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_json() {
        let result = LockerConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "simulator": {{ "sled_travel_ms": 250 }} }}"#).unwrap();

        let config = LockerConfig::from_path(file.path()).unwrap();
        assert_eq!(config.simulator.sled_travel(), Duration::from_millis(250));
    }

    #[test]
    fn test_from_missing_path() {
        let result = LockerConfig::from_path("/nonexistent/locker.json");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
