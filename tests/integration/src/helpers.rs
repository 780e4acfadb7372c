//! Test helper utilities for integration tests

use async_trait::async_trait;
use once_cell::sync::Lazy;
use portal_cache::{CacheBackend, CacheBackendError, CacheResult, MemoryCacheBackend};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Error returned by [`FlakyDependency`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// Transient network failure worth retrying
    #[error("ECONNRESET: connection reset by peer")]
    ConnectionReset,
    /// Request rejected by the dependency
    #[error("400 Bad Request: {0}")]
    BadRequest(String),
}

impl DependencyError {
    /// Only connection resets are retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionReset)
    }
}

/// Stand-in for a remote dependency that fails a set number of times
#[derive(Debug, Default)]
pub struct FlakyDependency {
    calls: AtomicU32,
    failures_before_success: u32,
    failing: AtomicBool,
}

impl FlakyDependency {
    /// Fail with `ConnectionReset` for the first `n` calls, then succeed
    pub fn failing_first(n: u32) -> Self {
        Self {
            failures_before_success: n,
            ..Default::default()
        }
    }

    /// Fail every call until [`FlakyDependency::recover`] is called
    pub fn down() -> Self {
        Self {
            failing: AtomicBool::new(true),
            ..Default::default()
        }
    }

    /// Stop failing
    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    /// Number of calls made so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Perform one call
    pub async fn call(&self) -> Result<&'static str, DependencyError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.load(Ordering::SeqCst) || n <= self.failures_before_success {
            Err(DependencyError::ConnectionReset)
        } else {
            Ok("ok")
        }
    }
}

/// Memory backend that can be switched into a failing state
#[derive(Debug, Default)]
pub struct SwitchableBackend {
    inner: MemoryCacheBackend,
    down: AtomicBool,
}

impl SwitchableBackend {
    /// Healthy backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail (or succeed again)
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> CacheResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(CacheBackendError::Unavailable("backend switched off".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheBackend for SwitchableBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration, tags: &[String]) -> CacheResult<()> {
        self.check()?;
        self.inner.set(key, value, ttl, tags).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn scan_by_tags(&self, tags: &[String]) -> CacheResult<Vec<String>> {
        self.check()?;
        self.inner.scan_by_tags(tags).await
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.check()?;
        self.inner.delete_pattern(pattern).await
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check()
    }

    fn name(&self) -> &'static str {
        "switchable"
    }

    fn is_distributed(&self) -> bool {
        false
    }
}
