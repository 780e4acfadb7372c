//! Named circuit breaker registry.
//!
//! `ResilienceService` is the single entry point for guarded outbound calls:
//! callers name a dependency key and the service composes that key's breaker
//! with an optional retry loop and timeout override.
//!
//! Layering: the retry loop runs *inside* the breaker. All attempts of one
//! `execute` call are a single breaker trial and share one timeout window
//! (the per-call override when given, the breaker's configured timeout
//! otherwise).

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
use crate::error::ResilienceError;
use crate::retry::{RetryConfig, RetryHandler};
use dashmap::DashMap;
use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Per-call options for [`ResilienceService::execute`]
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Retry the operation inside the breaker with this configuration
    pub retry: Option<RetryConfig>,
    /// Override the breaker's per-call timeout for this invocation
    pub timeout: Option<Duration>,
}

impl ExecuteOptions {
    /// Create empty options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Retry with the given configuration
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Override the call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Registry of circuit breakers keyed by dependency name
#[derive(Debug, Default)]
pub struct ResilienceService {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl ResilienceService {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a breaker for `key`, replacing any previous one
    pub fn register(&self, key: impl Into<String>, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let key = key.into();
        let breaker = Arc::new(CircuitBreaker::new(key.clone(), config));

        if self.breakers.insert(key.clone(), Arc::clone(&breaker)).is_some() {
            info!(key = %key, "Circuit breaker replaced");
        } else {
            info!(key = %key, "Circuit breaker registered");
        }
        breaker
    }

    /// Check whether a breaker is registered for `key`
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.breakers.contains_key(key)
    }

    /// Get the registered dependency keys, sorted
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Get the breaker registered for `key`
    #[must_use]
    pub fn breaker(&self, key: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(key).map(|entry| Arc::clone(entry.value()))
    }

    fn require<E>(&self, key: &str) -> Result<Arc<CircuitBreaker>, ResilienceError<E>> {
        self.breaker(key).ok_or_else(|| {
            error!(key = %key, "Execute called for unregistered dependency");
            ResilienceError::NotRegistered {
                key: key.to_string(),
            }
        })
    }

    /// Run `operation` through the breaker registered under `key`
    ///
    /// # Errors
    /// Returns `NotRegistered` for an unknown key, otherwise whatever the
    /// breaker or the retry loop reports.
    pub async fn execute<F, Fut, T, E>(
        &self,
        key: &str,
        operation: F,
        options: ExecuteOptions,
    ) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_if(key, operation, options, |_: &E| true).await
    }

    /// Like [`ResilienceService::execute`], retrying only errors accepted by
    /// `is_retryable` when a retry configuration is given
    ///
    /// # Errors
    /// Same as [`ResilienceService::execute`].
    pub async fn execute_if<F, Fut, T, E, P>(
        &self,
        key: &str,
        operation: F,
        options: ExecuteOptions,
        is_retryable: P,
    ) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let breaker = self.require(key)?;
        let timeout = options.timeout.unwrap_or(breaker.config().timeout);

        match options.retry {
            Some(retry) => {
                let handler = RetryHandler::new(retry);
                breaker
                    .guard(timeout, || handler.execute_if(operation, is_retryable))
                    .await
            }
            None => breaker.execute_with_timeout(timeout, operation).await,
        }
    }

    /// Get the state of the breaker registered under `key`
    ///
    /// # Errors
    /// Returns `NotRegistered` for an unknown key
    pub fn circuit_breaker_state(&self, key: &str) -> Result<CircuitState, ResilienceError<Infallible>> {
        Ok(self.require(key)?.state())
    }

    /// Get statistics for the breaker registered under `key`
    ///
    /// # Errors
    /// Returns `NotRegistered` for an unknown key
    pub fn circuit_breaker_stats(&self, key: &str) -> Result<CircuitBreakerStats, ResilienceError<Infallible>> {
        Ok(self.require(key)?.stats())
    }

    /// Get statistics for every registered breaker, sorted by key
    #[must_use]
    pub fn all_stats(&self) -> Vec<CircuitBreakerStats> {
        let mut stats: Vec<CircuitBreakerStats> =
            self.breakers.iter().map(|entry| entry.value().stats()).collect();
        stats.sort_by(|a, b| a.key.cmp(&b.key));
        stats
    }

    /// Reset the breaker registered under `key` to closed
    ///
    /// # Errors
    /// Returns `NotRegistered` for an unknown key
    pub fn reset_circuit_breaker(&self, key: &str) -> Result<(), ResilienceError<Infallible>> {
        self.require(key)?.reset();
        Ok(())
    }
}
