//! # Portal Cache
//!
//! Cache-aside layer for the client portal.
//!
//! [`CacheService`] stores serialized values under namespaced keys
//! (`{prefix}:{namespace}:{key}`) with a TTL and optional tags, and offers
//! [`CacheService::get_or_set`] as the cache-aside primitive. Entries sharing
//! a tag can be evicted together with [`CacheService::invalidate_by_tags`].
//!
//! The physical store sits behind the [`CacheBackend`] trait:
//!
//! - [`MemoryCacheBackend`]: in-process map with a tag index under one lock
//! - `RedisCacheBackend` (feature `redis`): one Redis set per tag
//!
//! Backend failures are absorbed: reads become misses, writes report `false`,
//! and the failure shows up in [`CacheStats::errors`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod entry;
pub mod error;
#[cfg(feature = "redis")]
pub mod redis_backend;
pub mod service;
mod stats;

pub use backend::{CacheBackend, MemoryCacheBackend};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::CacheEnvelope;
pub use error::{CacheBackendError, CacheResult};
#[cfg(feature = "redis")]
pub use redis_backend::RedisCacheBackend;
pub use service::{CacheHealth, CacheService, SetOptions};
pub use stats::CacheStats;
