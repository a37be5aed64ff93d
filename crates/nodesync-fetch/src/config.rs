// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Fetch layer settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use nodesync_core::ConfigurationError;

/// Default number of nodes per read/browse round.
pub const DEFAULT_MAX_NODES_PER_REQUEST: usize = 20;

/// Default number of nodes per children browse round.
pub const DEFAULT_MAX_CHILDREN_PER_REQUEST: usize = 100;

/// Settings for [`FetchDriver`](crate::FetchDriver) and the fetchers it runs.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use nodesync_fetch::FetcherConfig;
///
/// let config = FetcherConfig::builder()
///     .max_nodes_per_request(50)
///     .request_timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
/// assert_eq!(config.max_nodes_per_request, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Maximum nodes drained into one read/browse round.
    pub max_nodes_per_request: usize,

    /// Maximum nodes drained into one children browse round.
    pub max_children_per_request: usize,

    /// Per-call timeout. An expired call completes with `BadTimeout`.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Capacity of the outgoing event channel.
    pub event_channel_capacity: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_nodes_per_request: DEFAULT_MAX_NODES_PER_REQUEST,
            max_children_per_request: DEFAULT_MAX_CHILDREN_PER_REQUEST,
            request_timeout: Duration::from_secs(30),
            event_channel_capacity: 1024,
        }
    }
}

impl FetcherConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> FetcherConfigBuilder {
        FetcherConfigBuilder::default()
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_nodes_per_request == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_nodes_per_request",
                "must be at least 1",
            ));
        }
        if self.max_children_per_request == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_children_per_request",
                "must be at least 1",
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigurationError::invalid_value(
                "request_timeout",
                "must be greater than zero",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "event_channel_capacity",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Builder for [`FetcherConfig`].
#[derive(Debug, Default)]
pub struct FetcherConfigBuilder {
    max_nodes_per_request: Option<usize>,
    max_children_per_request: Option<usize>,
    request_timeout: Option<Duration>,
    event_channel_capacity: Option<usize>,
}

impl FetcherConfigBuilder {
    /// Sets the node round size.
    pub fn max_nodes_per_request(mut self, count: usize) -> Self {
        self.max_nodes_per_request = Some(count);
        self
    }

    /// Sets the children round size.
    pub fn max_children_per_request(mut self, count: usize) -> Self {
        self.max_children_per_request = Some(count);
        self
    }

    /// Sets the per-call timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the event channel capacity.
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = Some(capacity);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<FetcherConfig, ConfigurationError> {
        let defaults = FetcherConfig::default();
        let config = FetcherConfig {
            max_nodes_per_request: self
                .max_nodes_per_request
                .unwrap_or(defaults.max_nodes_per_request),
            max_children_per_request: self
                .max_children_per_request
                .unwrap_or(defaults.max_children_per_request),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            event_channel_capacity: self
                .event_channel_capacity
                .unwrap_or(defaults.event_channel_capacity),
        };
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// humantime_serde helper
// =============================================================================

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime::format_duration(*duration)
            .to_string()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetcherConfig::default();
        assert_eq!(config.max_nodes_per_request, 20);
        assert_eq!(config.max_children_per_request, 100);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_rejects_zero() {
        let err = FetcherConfig::builder()
            .max_nodes_per_request(0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidValue { ref field, .. } if field == "max_nodes_per_request"
        ));

        assert!(FetcherConfig::builder()
            .request_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_serde_humantime() {
        let config: FetcherConfig =
            serde_json::from_str(r#"{"request_timeout": "1m 30s", "max_nodes_per_request": 5}"#)
                .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(90));
        assert_eq!(config.max_nodes_per_request, 5);
        assert_eq!(config.max_children_per_request, 100);

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"1m 30s\""));
    }
}
