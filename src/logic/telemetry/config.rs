//! Tracker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::cloud_sync::SinkConfig;

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Enable clickstream tracking
    pub enabled: bool,
    /// Number of events per batch
    pub batch_size: usize,
    /// Intake queue bound; `None` is unbounded
    pub queue_capacity: Option<usize>,
    /// Worker poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Shutdown join bound in seconds
    pub shutdown_timeout_secs: u64,
    /// Remote destination
    pub sink: SinkConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: constants::is_clickstream_enabled(),
            batch_size: constants::get_batch_size(),
            queue_capacity: constants::get_queue_capacity(),
            poll_interval_ms: constants::get_poll_interval_ms(),
            shutdown_timeout_secs: constants::get_shutdown_timeout_secs(),
            sink: SinkConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Disabled config, e.g. for tests or opted-out installs
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Batch size with 0 clamped to 1
    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size == 0 {
            log::warn!("Clickstream batch size 0 is invalid, using 1");
        }
        self.batch_size.max(1)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_batch_size_clamped() {
        let config = TrackerConfig {
            batch_size: 0,
            ..TrackerConfig::default()
        };
        assert_eq!(config.effective_batch_size(), 1);
    }

    #[test]
    fn test_disabled() {
        assert!(!TrackerConfig::disabled().enabled);
    }

    #[test]
    fn test_durations() {
        let config = TrackerConfig {
            poll_interval_ms: 0,
            shutdown_timeout_secs: 5,
            ..TrackerConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_serde() {
        let json = serde_json::to_string(&TrackerConfig::disabled()).unwrap();
        let back: TrackerConfig = serde_json::from_str(&json).unwrap();
        assert!(!back.enabled);
        assert_eq!(back.sink.table_id, TrackerConfig::disabled().sink.table_id);
    }
}
