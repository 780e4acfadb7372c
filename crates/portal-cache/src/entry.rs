//! Serialized cache envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Value stored in the backend together with its caching metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope<T> {
    /// Cached value
    pub value: T,
    /// When the entry was written
    pub cached_at: DateTime<Utc>,
    /// Logical tags the entry was indexed under
    #[serde(default)]
    pub tags: Vec<String>,
    /// Time-to-live in milliseconds
    pub ttl_ms: u64,
}

impl<T> CacheEnvelope<T> {
    /// Wrap a value written now
    pub fn new(value: T, ttl: Duration, tags: Vec<String>) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
            tags,
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Configured TTL
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Wall-clock expiry; the backend TTL stays authoritative
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining_ttl().is_zero()
    }

    /// Time left before the entry expires, zero once elapsed
    #[must_use]
    pub fn remaining_ttl(&self) -> Duration {
        let age = Utc::now()
            .signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.ttl().saturating_sub(age)
    }
}
