//! Pipeline and feed configuration.

use std::env;
use std::time::Duration;

use crate::delivery::DeliveryMode;
use crate::error::{PipelineError, Result};

/// Public HELLO CYCLING GBFS endpoints used when nothing else is configured.
pub const DEFAULT_STATUS_URL: &str =
    "https://api-public.odpt.org/api/v4/gbfs/hellocycling/station_status.json";
pub const DEFAULT_STATION_URL: &str =
    "https://api-public.odpt.org/api/v4/gbfs/hellocycling/station_information.json";

/// Five minutes, the refresh period of the upstream feed.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Settings for one [`crate::poller::PollScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    poll_interval_secs: u64,
    mode: DeliveryMode,
}

impl PipelineConfig {
    /// Validates and builds a config. The poll interval must be positive.
    pub fn new(poll_interval_secs: u64, mode: DeliveryMode) -> Result<Self> {
        if poll_interval_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "poll interval must be greater than zero seconds".to_string(),
            ));
        }
        Ok(Self {
            poll_interval_secs,
            mode,
        })
    }

    pub fn poll_interval_secs(&self) -> u64 {
        self.poll_interval_secs
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            mode: DeliveryMode::Smoothed,
        }
    }
}

/// Where to fetch station status and station metadata from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub status_url: String,
    pub station_url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            status_url: DEFAULT_STATUS_URL.to_string(),
            station_url: DEFAULT_STATION_URL.to_string(),
        }
    }
}

impl FeedConfig {
    /// Reads `GBFS_STATUS_URL` and `GBFS_STATION_URL`, falling back to the
    /// public defaults.
    pub fn from_env() -> Self {
        Self {
            status_url: env::var("GBFS_STATUS_URL")
                .unwrap_or_else(|_| DEFAULT_STATUS_URL.to_string()),
            station_url: env::var("GBFS_STATION_URL")
                .unwrap_or_else(|_| DEFAULT_STATION_URL.to_string()),
        }
    }

    /// Replaces either URL when an override is given.
    pub fn with_overrides(mut self, status_url: Option<String>, station_url: Option<String>) -> Self {
        if let Some(url) = status_url {
            self.status_url = url;
        }
        if let Some(url) = station_url {
            self.station_url = url;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_rejected() {
        let err = PipelineConfig::new(0, DeliveryMode::Smoothed).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn test_valid_config() {
        let config = PipelineConfig::new(60, DeliveryMode::Immediate).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.mode(), DeliveryMode::Immediate);
    }

    #[test]
    fn test_default_is_smoothed() {
        let config = PipelineConfig::default();
        assert_eq!(config.mode(), DeliveryMode::Smoothed);
        assert_eq!(config.poll_interval_secs(), DEFAULT_POLL_INTERVAL_SECS);
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        // No other test touches these variables.
        unsafe {
            env::set_var("GBFS_STATUS_URL", "http://env/status.json");
            env::remove_var("GBFS_STATION_URL");
        }

        let config = FeedConfig::from_env();

        unsafe {
            env::remove_var("GBFS_STATUS_URL");
        }
        assert_eq!(config.status_url, "http://env/status.json");
        assert_eq!(config.station_url, DEFAULT_STATION_URL);
    }

    #[test]
    fn test_overrides() {
        let config = FeedConfig::default().with_overrides(Some("http://s".to_string()), None);
        assert_eq!(config.status_url, "http://s");
        assert_eq!(config.station_url, DEFAULT_STATION_URL);
    }
}
