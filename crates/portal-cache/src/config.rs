//! Cache configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix shared by every physical key
    pub key_prefix: String,
    /// Logical namespace appended after the prefix
    pub namespace: String,
    /// TTL used when a write doesn't specify one
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
    /// Capacity of the in-memory backend
    pub max_entries: usize,
    /// Redis URL; the in-memory backend is used when absent
    pub redis_url: Option<String>,
    /// Per-command timeout for networked backends
    #[serde(with = "humantime_serde")]
    pub operation_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: "portal".to_string(),
            namespace: "cache".to_string(),
            default_ttl: Duration::from_secs(300),
            max_entries: 10_000,
            redis_url: None,
            operation_timeout: Duration::from_secs(2),
        }
    }
}

impl CacheConfig {
    /// Create a new builder
    #[must_use]
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Set key prefix
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Set namespace
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// Set default TTL
    #[must_use]
    pub const fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    /// Set max entries for the memory backend
    #[must_use]
    pub const fn max_entries(mut self, max: usize) -> Self {
        self.config.max_entries = max;
        self
    }

    /// Set Redis URL
    #[must_use]
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.redis_url = Some(url.into());
        self
    }

    /// Set operation timeout
    #[must_use]
    pub const fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout = timeout;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
