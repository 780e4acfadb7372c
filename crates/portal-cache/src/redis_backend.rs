//! Redis cache backend.
//!
//! Uses `redis::aio::ConnectionManager` for multiplexed connections with
//! automatic reconnection. Each tag is a Redis set of physical keys, written
//! in the same MULTI as the value. A tag set expires no earlier than its
//! longest-lived member (`PEXPIRE ... NX` then `GT`, Redis 7.0+). Members
//! whose key has expired are pruned lazily when the tag is scanned.

use crate::backend::CacheBackend;
use crate::error::{CacheBackendError, CacheResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::RedisResult;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Redis-backed cache store shared between portal instances
#[derive(Clone)]
pub struct RedisCacheBackend {
    connection_manager: ConnectionManager,
    operation_timeout: Duration,
}

impl std::fmt::Debug for RedisCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheBackend")
            .field("connection_manager", &"ConnectionManager")
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

impl RedisCacheBackend {
    /// Connect to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL isn't a `redis://`/`rediss://` URL or the
    /// initial connection fails.
    pub async fn connect(url: &str, operation_timeout: Duration) -> CacheResult<Self> {
        if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
            return Err(CacheBackendError::Config(format!(
                "unsupported Redis URL: {}",
                redact_url(url)
            )));
        }

        let client = redis::Client::open(url).map_err(|e| {
            CacheBackendError::Config(format!("Failed to create Redis client: {e}"))
        })?;

        let connection_manager = tokio::time::timeout(operation_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheBackendError::Timeout(operation_timeout))?
            .map_err(|e| CacheBackendError::Connection(format!("Failed to connect to Redis: {e}")))?;

        info!(url = %redact_url(url), "Redis cache backend connected");

        Ok(Self {
            connection_manager,
            operation_timeout,
        })
    }

    async fn run<T, F>(&self, operation: F) -> CacheResult<T>
    where
        F: Future<Output = RedisResult<T>> + Send,
    {
        match tokio::time::timeout(self.operation_timeout, operation).await {
            Ok(result) => result.map_err(CacheBackendError::from),
            Err(_) => Err(CacheBackendError::Timeout(self.operation_timeout)),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.connection_manager.clone();
        self.run(async {
            let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration, tags: &[String]) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .ignore();
        for tag in tags {
            pipe.cmd("SADD").arg(tag).arg(key).ignore();
            pipe.cmd("PEXPIRE").arg(tag).arg(ttl_ms).arg("NX").ignore();
            pipe.cmd("PEXPIRE").arg(tag).arg(ttl_ms).arg("GT").ignore();
        }

        self.run(pipe.query_async::<_, ()>(&mut conn)).await?;

        debug!(key = %key, ttl_ms, tag_count = tags.len(), "Redis SET");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection_manager.clone();
        let removed: u64 = self
            .run(async { redis::cmd("DEL").arg(key).query_async(&mut conn).await })
            .await?;
        Ok(removed > 0)
    }

    async fn scan_by_tags(&self, tags: &[String]) -> CacheResult<Vec<String>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection_manager.clone();

        let members: Vec<String> = self
            .run(async { redis::cmd("SUNION").arg(tags).query_async(&mut conn).await })
            .await?;
        if members.is_empty() {
            return Ok(members);
        }

        let mut exists = redis::pipe();
        for member in &members {
            exists.cmd("EXISTS").arg(member);
        }
        let alive: Vec<bool> = self
            .run(async { exists.query_async(&mut conn).await })
            .await?;

        let (live, stale): (Vec<_>, Vec<_>) = members
            .into_iter()
            .zip(alive)
            .partition(|(_, is_alive)| *is_alive);

        if !stale.is_empty() {
            let stale: Vec<String> = stale.into_iter().map(|(key, _)| key).collect();
            let mut prune = redis::pipe();
            for tag in tags {
                prune.cmd("SREM").arg(tag).arg(&stale).ignore();
            }
            self.run(prune.query_async::<_, ()>(&mut conn)).await?;
            debug!(pruned = stale.len(), "Pruned expired keys from tag sets");
        }

        let keys: BTreeSet<String> = live.into_iter().map(|(key, _)| key).collect();
        Ok(keys.into_iter().collect())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.connection_manager.clone();
        let mut deleted: u64 = 0;
        let mut cursor: u64 = 0;

        // SCAN keeps the server responsive on large keyspaces
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = self
                .run(async {
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(100)
                        .query_async(&mut conn)
                        .await
                })
                .await?;

            if !keys.is_empty() {
                let count: u64 = self
                    .run(async { redis::cmd("DEL").arg(&keys).query_async(&mut conn).await })
                    .await?;
                deleted += count;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, deleted, "Redis pattern DEL");
        Ok(deleted)
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        let pong: String = self
            .run(async { redis::cmd("PING").query_async(&mut conn).await })
            .await?;

        if pong == "PONG" {
            Ok(())
        } else {
            Err(CacheBackendError::Connection(format!("unexpected PING reply: {pong}")))
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }

    fn is_distributed(&self) -> bool {
        true
    }
}

/// Redact credentials from a Redis URL for logging
fn redact_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            return format!("{}***{}", &url[..=colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}
