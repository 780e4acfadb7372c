//! Cache backend abstraction and the in-memory implementation.
//!
//! Backends store opaque bytes under physical keys with a TTL and maintain a
//! tag → keys index so tag invalidation never has to scan the key space.

use crate::error::CacheResult;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Cache backend trait for polymorphic cache implementations
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get a value; expired entries read as `None` and are removed
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Set a value with TTL, indexing the key under each tag
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration, tags: &[String]) -> CacheResult<()>;

    /// Delete a key; returns whether a live entry was removed
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Keys currently indexed under any of `tags`
    async fn scan_by_tags(&self, tags: &[String]) -> CacheResult<Vec<String>>;

    /// Delete all keys matching a `prefix*` pattern
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;

    /// Lightweight round trip to the store
    async fn ping(&self) -> CacheResult<()>;

    /// Get backend name for metrics
    fn name(&self) -> &'static str;

    /// Check if backend is shared between processes
    fn is_distributed(&self) -> bool;
}

/// Local cache entry with instant-based expiry
#[derive(Debug)]
struct MemoryEntry {
    data: Vec<u8>,
    expires_at: Instant,
    tags: Vec<String>,
    hits: u64,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Entries and the tag index, kept under one lock so a delete removes both
#[derive(Debug, Default)]
struct MemoryStore {
    entries: HashMap<String, MemoryEntry>,
    tag_index: HashMap<String, HashSet<String>>,
}

impl MemoryStore {
    fn insert(&mut self, key: &str, entry: MemoryEntry) {
        self.remove(key);
        for tag in &entry.tags {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        self.entries.insert(key.to_string(), entry);
    }

    fn remove(&mut self, key: &str) -> Option<MemoryEntry> {
        let entry = self.entries.remove(key)?;
        for tag in &entry.tags {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
        Some(entry)
    }

    /// Evict expired entries, then the least-hit ones while at capacity
    fn evict_if_needed(&mut self, max_entries: usize) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }

        if self.entries.len() >= max_entries {
            let to_remove = self.entries.len() - max_entries + 1;
            let mut hit_counts: Vec<(String, u64)> = self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.hits))
                .collect();
            hit_counts.sort_by_key(|(_, hits)| *hits);

            for (key, _) in hit_counts.into_iter().take(to_remove) {
                debug!(key = %key, "Evicting cache entry at capacity");
                self.remove(&key);
            }
        }
    }
}

/// In-memory cache backend for single-instance deployments and tests
#[derive(Debug)]
pub struct MemoryCacheBackend {
    store: RwLock<MemoryStore>,
    max_entries: usize,
}

impl MemoryCacheBackend {
    /// Create a new memory cache backend
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: RwLock::new(MemoryStore::default()),
            max_entries: max_entries.max(1),
        }
    }

    /// Number of stored entries, including expired ones not yet read
    pub async fn len(&self) -> usize {
        self.store.read().await.entries.len()
    }

    /// Check whether the backend holds no entries
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryCacheBackend {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut store = self.store.write().await;

        match store.entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.hits += 1;
                return Ok(Some(entry.data.clone()));
            }
            Some(_) => {}
            None => return Ok(None),
        }

        store.remove(key);
        debug!(key = %key, "Expired cache entry removed on read");
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration, tags: &[String]) -> CacheResult<()> {
        let mut store = self.store.write().await;
        if !store.entries.contains_key(key) {
            store.evict_if_needed(self.max_entries);
        }

        store.insert(
            key,
            MemoryEntry {
                data: value,
                expires_at: Instant::now() + ttl,
                tags: tags.to_vec(),
                hits: 0,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut store = self.store.write().await;
        Ok(store.remove(key).is_some_and(|entry| !entry.is_expired()))
    }

    async fn scan_by_tags(&self, tags: &[String]) -> CacheResult<Vec<String>> {
        let store = self.store.read().await;

        let keys: BTreeSet<&String> = tags
            .iter()
            .filter_map(|tag| store.tag_index.get(tag))
            .flatten()
            .filter(|key| store.entries.get(*key).is_some_and(|e| !e.is_expired()))
            .collect();

        Ok(keys.into_iter().cloned().collect())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut store = self.store.write().await;

        // Simple prefix matching (Redis-style patterns would need more complex logic)
        let pattern_prefix = pattern.trim_end_matches('*');
        let matching: Vec<String> = store
            .entries
            .keys()
            .filter(|k| k.starts_with(pattern_prefix))
            .cloned()
            .collect();

        for key in &matching {
            store.remove(key);
        }
        Ok(matching.len() as u64)
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_distributed(&self) -> bool {
        false
    }
}
