//! Monitor configuration.

use std::time::Duration;

use crate::ble::uuids::DEFAULT_NAME_FILTER;
use crate::error::{Error, Result};

/// Configuration for discovering, connecting to and collecting from a sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonitorConfig {
    /// Case-insensitive fragment of the advertised device name.
    pub name_filter: String,
    /// How long to scan before giving up.
    pub scan_timeout: Duration,
    /// Length of the RR collection window.
    pub collection_duration: Duration,
    /// Maximum connection attempts.
    pub connect_attempts: u32,
    /// Delay between connection attempts.
    pub reconnect_delay: Duration,
}

impl MonitorConfig {
    /// Default scan timeout (10 seconds).
    pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default collection window (20 seconds).
    pub const DEFAULT_COLLECTION_DURATION: Duration = Duration::from_secs(20);
    /// Default number of connection attempts.
    pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;
    /// Default delay between connection attempts.
    pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the advertised-name filter.
    pub fn with_name_filter(mut self, filter: impl Into<String>) -> Self {
        self.name_filter = filter.into();
        self
    }

    /// Set the scan timeout.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set the collection window.
    pub fn with_collection_duration(mut self, duration: Duration) -> Self {
        self.collection_duration = duration;
        self
    }

    /// Set the connection retry parameters.
    pub fn with_connect_params(mut self, attempts: u32, delay: Duration) -> Self {
        self.connect_attempts = attempts;
        self.reconnect_delay = delay;
        self
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.name_filter.trim().is_empty() {
            return Err(invalid("name_filter", &self.name_filter));
        }
        if self.scan_timeout.is_zero() {
            return Err(invalid("scan_timeout", &format!("{:?}", self.scan_timeout)));
        }
        if self.collection_duration.is_zero() {
            return Err(invalid(
                "collection_duration",
                &format!("{:?}", self.collection_duration),
            ));
        }
        if self.connect_attempts == 0 {
            return Err(invalid("connect_attempts", "0"));
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            name_filter: DEFAULT_NAME_FILTER.to_string(),
            scan_timeout: Self::DEFAULT_SCAN_TIMEOUT,
            collection_duration: Self::DEFAULT_COLLECTION_DURATION,
            connect_attempts: Self::DEFAULT_CONNECT_ATTEMPTS,
            reconnect_delay: Self::DEFAULT_RECONNECT_DELAY,
        }
    }
}

fn invalid(name: &str, value: &str) -> Error {
    Error::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.name_filter, "XOSS");
        assert_eq!(config.collection_duration, Duration::from_secs(20));
        assert_eq!(config.connect_attempts, 3);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_builder() {
        let config = MonitorConfig::new()
            .with_name_filter("Polar")
            .with_collection_duration(Duration::from_secs(60))
            .with_scan_timeout(Duration::from_secs(5))
            .with_connect_params(5, Duration::from_millis(250));
        assert_eq!(config.name_filter, "Polar");
        assert_eq!(config.collection_duration, Duration::from_secs(60));
        assert_eq!(config.scan_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_attempts, 5);
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let err = MonitorConfig::new().with_name_filter("  ").validate();
        assert!(matches!(err, Err(Error::InvalidParameter { ref name, .. }) if name == "name_filter"));

        let err = MonitorConfig::new()
            .with_collection_duration(Duration::ZERO)
            .validate();
        assert!(
            matches!(err, Err(Error::InvalidParameter { ref name, .. }) if name == "collection_duration")
        );

        let err = MonitorConfig::new()
            .with_connect_params(0, Duration::ZERO)
            .validate();
        assert!(matches!(err, Err(Error::InvalidParameter { ref name, .. }) if name == "connect_attempts"));

        let err = MonitorConfig::new()
            .with_scan_timeout(Duration::ZERO)
            .validate();
        assert!(matches!(err, Err(Error::InvalidParameter { ref name, .. }) if name == "scan_timeout"));
    }
}
