//! Scheduler configuration.
//!
//! The scheduler consumes configuration, it does not own where it comes from.
//! `from_json_str` / `from_json_file` exist for the CLI and for tests.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::backoff::BackoffPolicy;
use crate::domain::ConfigError;

/// Default maximum number of work tasks executing at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 32;

/// Configuration for one scheduler run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Global cap on in-flight work tasks. Must be > 0.
    pub max_concurrency: usize,

    pub backoff: BackoffPolicy,

    /// Wait for executions that are still running when `Done` is reached,
    /// and surface their faults. When false they finish on their own.
    pub drain_on_done: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            backoff: BackoffPolicy::default(),
            drain_on_done: false,
        }
    }
}

impl SchedulerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Returns a description of the first invalid setting, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be greater than zero".to_string());
        }
        if self.backoff.multiplier < 1.0 {
            return Err(format!(
                "backoff.multiplier must be >= 1.0, got {}",
                self.backoff.multiplier
            ));
        }
        if self.backoff.max_delay < self.backoff.base_delay {
            return Err("backoff.max_delay must not be shorter than backoff.base_delay".to_string());
        }
        Ok(())
    }
}

/// (De)serialize a `Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_config_is_valid() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert!(!config.drain_on_done);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = SchedulerConfig::from_json_str(
            r#"{ "max_concurrency": 4, "backoff": { "max_delay": 200 } }"#,
        )
        .expect("parse");
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.backoff.max_delay, Duration::from_millis(200));
        assert_eq!(config.backoff.base_delay, Duration::from_millis(1));
    }

    #[test]
    fn durations_serialize_as_millis() {
        let config = SchedulerConfig::default();
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["backoff"]["base_delay"], 1);
        assert_eq!(value["backoff"]["max_delay"], 50);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = SchedulerConfig {
            max_concurrency: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().unwrap_err().contains("max_concurrency"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = SchedulerConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = SchedulerConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn loads_scheduler_file() {
        let path = std::env::temp_dir().join(format!("relay-config-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{ "max_concurrency": 8, "backoff": { "max_delay": 20 }, "drain_on_done": true }"#,
        )
        .unwrap();

        let config = SchedulerConfig::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.backoff.max_delay, Duration::from_millis(20));
        assert!(config.drain_on_done);
    }
}
