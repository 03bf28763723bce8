//! Lock configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Lock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Redis URL (redis://host:port or rediss://host:port for TLS).
    pub url: String,
    /// Prefix prepended to every lock key (`prefix:key`).
    pub key_prefix: Option<String>,
    /// Connection timeout.
    #[serde(with = "duration_ms", default = "default_connection_timeout")]
    pub connection_timeout: Duration,
    /// Per-call command timeout. Bounds every store round trip so a hung
    /// connection cannot stall lease renewal past its tick.
    #[serde(with = "duration_ms", default = "default_command_timeout")]
    pub command_timeout: Duration,
    /// Retry policy for transient transport failures during renewal.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_connection_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(3)
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: None,
            connection_timeout: default_connection_timeout(),
            command_timeout: default_command_timeout(),
            retry: RetryPolicy::default(),
        }
    }
}

impl LockConfig {
    /// Create a new configuration.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Create a builder.
    pub fn builder() -> LockConfigBuilder {
        LockConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> LockConfigBuilder {
        let mut builder = LockConfigBuilder::new();

        if let Ok(url) = std::env::var("REDIS_URL") {
            builder = builder.url(url);
        }

        if let Ok(prefix) = std::env::var("LOCK_KEY_PREFIX") {
            builder = builder.key_prefix(prefix);
        }

        if let Ok(timeout) = std::env::var("LOCK_COMMAND_TIMEOUT_MS")
            && let Ok(millis) = timeout.parse()
        {
            builder = builder.command_timeout(Duration::from_millis(millis));
        }

        builder
    }
}

/// Builder for lock configuration.
#[derive(Default)]
pub struct LockConfigBuilder {
    config: LockConfig,
}

impl LockConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: LockConfig::default(),
        }
    }

    /// Set the Redis URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Set the key prefix.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = Some(prefix.into());
        self
    }

    /// Set the connection timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Set the per-call command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Set the renewal retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> LockConfig {
        self.config
    }
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = LockConfig::default();
        assert_eq!(config.url, "redis://localhost:6379");
        assert_eq!(config.key_prefix, None);
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
        assert_eq!(config.command_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_config_builder() {
        let config = LockConfig::builder()
            .url("redis://cache:6380")
            .key_prefix("locks")
            .command_timeout(Duration::from_millis(500))
            .build();

        assert_eq!(config.url, "redis://cache:6380");
        assert_eq!(config.key_prefix, Some("locks".to_string()));
        assert_eq!(config.command_timeout, Duration::from_millis(500));
    }
}
