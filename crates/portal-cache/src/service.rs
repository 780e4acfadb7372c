//! Cache-aside service on top of a [`CacheBackend`].
//!
//! Backend failures never reach the caller: reads degrade to misses, writes
//! and deletes report `false`, and every failure is logged and counted in
//! [`CacheStats::errors`]. Only fetcher errors from [`CacheService::get_or_set`]
//! propagate.

use crate::backend::{CacheBackend, MemoryCacheBackend};
use crate::config::CacheConfig;
use crate::entry::CacheEnvelope;
use crate::error::{CacheBackendError, CacheResult};
use crate::stats::{CacheStats, StatsRecorder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Per-write options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// TTL override; the service default applies when `None`
    pub ttl: Option<Duration>,
    /// Tags the entry is indexed under for invalidation
    pub tags: Vec<String>,
}

impl SetOptions {
    /// Options with the default TTL and no tags
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the TTL
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Add a tag
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add several tags
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Result of a backend round trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheHealth {
    /// Whether the backend answered
    pub is_healthy: bool,
    /// Backend name
    pub backend: String,
    /// Round-trip time of the ping
    pub response_time_ms: u64,
    /// Failure description when unhealthy
    pub error: Option<String>,
}

/// Cache-aside service with namespaced keys, tag invalidation and statistics
///
/// Cloning is cheap; clones share the backend and the counters.
#[derive(Clone)]
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
    key_prefix: String,
    namespace: String,
    default_ttl: Duration,
    stats: Arc<StatsRecorder>,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend.name())
            .field("key_prefix", &self.key_prefix)
            .field("namespace", &self.namespace)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl CacheService {
    /// Create a service over an existing backend
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        info!(
            backend = backend.name(),
            distributed = backend.is_distributed(),
            prefix = %config.key_prefix,
            namespace = %config.namespace,
            default_ttl_secs = config.default_ttl.as_secs(),
            "Cache service initialized"
        );

        Self {
            backend,
            key_prefix: config.key_prefix.clone(),
            namespace: config.namespace.clone(),
            default_ttl: config.default_ttl,
            stats: Arc::new(StatsRecorder::default()),
        }
    }

    /// Create a service backed by a fresh in-memory store
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(Arc::new(MemoryCacheBackend::new(config.max_entries)), config)
    }

    /// Create a service from configuration, connecting to Redis when a URL is set
    ///
    /// # Errors
    ///
    /// Returns an error if the Redis connection can't be established, or a URL
    /// is configured without the `redis` feature.
    pub async fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        match &config.redis_url {
            None => Ok(Self::in_memory(config)),
            #[cfg(feature = "redis")]
            Some(url) => {
                let backend =
                    crate::redis_backend::RedisCacheBackend::connect(url, config.operation_timeout)
                        .await?;
                Ok(Self::new(Arc::new(backend), config))
            }
            #[cfg(not(feature = "redis"))]
            Some(_) => Err(CacheBackendError::Config(
                "redis_url is set but the redis feature is disabled".to_string(),
            )),
        }
    }

    /// A view over another namespace sharing this service's backend and counters
    #[must_use]
    pub fn namespaced(&self, namespace: impl Into<String>) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            key_prefix: self.key_prefix.clone(),
            namespace: namespace.into(),
            default_ttl: self.default_ttl,
            stats: Arc::clone(&self.stats),
        }
    }

    /// Namespace of this view
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// TTL applied when a write doesn't specify one
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Physical key for a logical key: `{prefix}:{namespace}:{key}`
    #[must_use]
    pub fn build_key(&self, key: &str) -> String {
        format!("{}:{}:{}", self.key_prefix, self.namespace, key)
    }

    /// Index key for a tag, scoped to this namespace
    fn tag_key(&self, tag: &str) -> String {
        format!("{}:__tags__:{}:{}", self.key_prefix, self.namespace, tag)
    }

    /// Get a cached value; misses, expired entries and backend errors all read as `None`
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_entry(key).await.map(|entry| entry.value)
    }

    /// Get a cached value together with its metadata
    pub async fn get_entry<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEnvelope<T>> {
        let full_key = self.build_key(key);

        let bytes = match self.backend.get(&full_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.stats.record_miss();
                debug!(key = %full_key, "Cache miss");
                return None;
            }
            Err(e) => {
                self.record_backend_error("get", &full_key, &e);
                self.stats.record_miss();
                return None;
            }
        };

        let envelope: CacheEnvelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.record_backend_error("get", &full_key, &CacheBackendError::from(e));
                self.stats.record_miss();
                return None;
            }
        };

        if envelope.is_expired() {
            if let Err(e) = self.backend.delete(&full_key).await {
                self.record_backend_error("delete", &full_key, &e);
            }
            self.stats.record_miss();
            debug!(key = %full_key, "Cache entry expired");
            return None;
        }

        self.stats.record_hit();
        debug!(key = %full_key, "Cache hit");
        Some(envelope)
    }

    /// Store a value; returns `false` if the backend rejected the write
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, options: SetOptions) -> bool {
        let full_key = self.build_key(key);
        let ttl = options.ttl.unwrap_or(self.default_ttl);
        let tag_keys: Vec<String> = options.tags.iter().map(|t| self.tag_key(t)).collect();

        let envelope = CacheEnvelope::new(value, ttl, options.tags);
        let bytes = match serde_json::to_vec(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.record_backend_error("set", &full_key, &CacheBackendError::from(e));
                return false;
            }
        };

        match self.backend.set(&full_key, bytes, ttl, &tag_keys).await {
            Ok(()) => {
                self.stats.record_set();
                debug!(key = %full_key, ttl_ms = ttl.as_millis() as u64, tags = ?envelope.tags, "Cache set");
                true
            }
            Err(e) => {
                self.record_backend_error("set", &full_key, &e);
                false
            }
        }
    }

    /// Delete a key; `true` whether or not it existed, `false` on backend failure
    pub async fn delete(&self, key: &str) -> bool {
        let full_key = self.build_key(key);
        match self.backend.delete(&full_key).await {
            Ok(_) => {
                self.stats.record_deletes(1);
                debug!(key = %full_key, "Cache delete");
                true
            }
            Err(e) => {
                self.record_backend_error("delete", &full_key, &e);
                false
            }
        }
    }

    /// Whether a live entry exists, without touching hit/miss counters
    pub async fn exists(&self, key: &str) -> bool {
        let full_key = self.build_key(key);
        match self.backend.get(&full_key).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                self.record_backend_error("exists", &full_key, &e);
                false
            }
        }
    }

    /// Delete every entry carrying any of `tags`; returns the number deleted
    pub async fn invalidate_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> u64 {
        if tags.is_empty() {
            return 0;
        }

        let tag_keys: Vec<String> = tags.iter().map(|t| self.tag_key(t.as_ref())).collect();
        let keys = match self.backend.scan_by_tags(&tag_keys).await {
            Ok(keys) => keys,
            Err(e) => {
                self.record_backend_error("scan_by_tags", &tag_keys.join(","), &e);
                return 0;
            }
        };

        let mut deleted = 0_u64;
        for key in &keys {
            match self.backend.delete(key).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => self.record_backend_error("delete", key, &e),
            }
        }
        self.stats.record_deletes(deleted);

        info!(
            tags = ?tags.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
            deleted,
            "Cache invalidated by tags"
        );
        deleted
    }

    /// Return the cached value, or run `fetcher` once, cache its result and return it
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error unchanged; nothing is cached in that case.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        options: SetOptions,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        let value = fetcher().await?;
        self.set(key, &value, options).await;
        Ok(value)
    }

    /// Delete every entry in this namespace along with its tag sets; returns
    /// the number of entries deleted
    pub async fn clear(&self) -> u64 {
        let pattern = format!("{}:{}:*", self.key_prefix, self.namespace);
        let deleted = match self.backend.delete_pattern(&pattern).await {
            Ok(deleted) => deleted,
            Err(e) => {
                self.record_backend_error("clear", &pattern, &e);
                return 0;
            }
        };

        let tag_pattern = self.tag_key("*");
        if let Err(e) = self.backend.delete_pattern(&tag_pattern).await {
            self.record_backend_error("clear", &tag_pattern, &e);
        }

        self.stats.record_deletes(deleted);
        info!(namespace = %self.namespace, deleted, "Cache namespace cleared");
        deleted
    }

    /// Snapshot of the counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Zero the counters
    pub fn reset_stats(&self) {
        self.stats.reset();
        info!("Cache statistics reset");
    }

    /// Ping the backend and time the round trip
    pub async fn health_check(&self) -> CacheHealth {
        let start = Instant::now();
        let result = self.backend.ping().await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => CacheHealth {
                is_healthy: true,
                backend: self.backend.name().to_string(),
                response_time_ms,
                error: None,
            },
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "Cache health check failed");
                CacheHealth {
                    is_healthy: false,
                    backend: self.backend.name().to_string(),
                    response_time_ms,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn record_backend_error(&self, operation: &str, key: &str, error: &CacheBackendError) {
        self.stats.record_error();
        warn!(
            backend = self.backend.name(),
            operation,
            key = %key,
            error = %error,
            "Cache backend error"
        );
    }
}
