//! Cache operation counters.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of the cache counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Reads served from the cache
    pub hits: u64,
    /// Reads that found nothing usable
    pub misses: u64,
    /// Successful writes
    pub sets: u64,
    /// Delete calls, including tag-invalidated keys
    pub deletes: u64,
    /// Backend failures absorbed by the service
    pub errors: u64,
    /// Hit percentage over all reads, 0 when there were none
    pub hit_rate: f64,
    /// When the counters were last zeroed
    pub last_reset: DateTime<Utc>,
}

impl CacheStats {
    /// Total reads
    #[must_use]
    pub const fn total_reads(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Shared atomic counters behind [`CacheStats`]
#[derive(Debug)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
    last_reset: RwLock<DateTime<Utc>>,
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            last_reset: RwLock::new(Utc::now()),
        }
    }
}

impl StatsRecorder {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deletes(&self, count: u64) {
        self.deletes.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        };

        CacheStats {
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            hit_rate,
            last_reset: *self.last_reset.read(),
        }
    }

    pub(crate) fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        *self.last_reset.write() = Utc::now();
    }
}
