//! Circuit breaker pattern implementation.
//!
//! The circuit breaker prevents repeated calls to a dependency that is
//! currently failing and probes for recovery once a cool-down has elapsed.
//! The Open → HalfOpen transition is evaluated lazily when a call arrives;
//! there is no background timer.

use crate::error::ResilienceError;
use crate::timeout::with_timeout;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, testing if the dependency recovered
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Number of half-open successes required to close the circuit
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Maximum duration of a guarded call before it counts as a failure
    #[serde(default = "default_call_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Time the circuit stays open before a probe is allowed
    #[serde(default = "default_reset_timeout", with = "humantime_serde")]
    pub reset_timeout: Duration,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_reset_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout: default_call_timeout(),
            reset_timeout: default_reset_timeout(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Set the failure threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the success threshold
    #[must_use]
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set the per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the open-state cool-down
    #[must_use]
    pub fn with_reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.reset_timeout = reset_timeout;
        self
    }
}

/// Mutable breaker state, always read and written under one lock
#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    total_calls: u64,
    total_successes: u64,
    total_failures: u64,
    rejected_calls: u64,
    times_opened: u64,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure: None,
            last_failure_at: None,
            total_calls: 0,
            total_successes: 0,
            total_failures: 0,
            rejected_calls: 0,
            times_opened: 0,
        }
    }
}

/// Circuit breaker guarding a single dependency
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Dependency key
    key: String,
    /// Configuration
    config: CircuitBreakerConfig,
    /// State machine and counters
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(key: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let key = key.into();
        debug!(
            key = %key,
            failure_threshold = config.failure_threshold,
            success_threshold = config.success_threshold,
            timeout_ms = config.timeout.as_millis(),
            reset_timeout_ms = config.reset_timeout.as_millis(),
            "Circuit breaker created"
        );
        Self {
            key,
            config,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(key: impl Into<String>) -> Self {
        Self::new(key, CircuitBreakerConfig::default())
    }

    /// Get the dependency key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state without evaluating the reset timeout
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Get the current failure count
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Get the consecutive half-open success count
    #[must_use]
    pub fn success_count(&self) -> u32 {
        self.inner.lock().success_count
    }

    /// Run `operation` under the breaker with the configured call timeout.
    ///
    /// # Errors
    /// Returns `CircuitOpen` without invoking `operation` while the circuit is
    /// open, `Timeout` when the call exceeds its budget, or `Operation` with
    /// the operation's own error.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_timeout(self.config.timeout, operation).await
    }

    /// Run `operation` under the breaker with an explicit call timeout
    ///
    /// # Errors
    /// Same as [`CircuitBreaker::execute`].
    pub async fn execute_with_timeout<F, Fut, T, E>(
        &self,
        timeout: Duration,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.guard(timeout, move || async move {
            operation().await.map_err(ResilienceError::Operation)
        })
        .await
    }

    /// Run an operation that already speaks `ResilienceError` as one trial.
    ///
    /// Used to nest a retry loop inside the breaker without double wrapping.
    pub(crate) async fn guard<F, Fut, T, E>(
        &self,
        timeout: Duration,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
    {
        self.try_acquire()?;

        let result = with_timeout(timeout, operation()).await;
        match &result {
            Ok(_) => self.record_success(),
            Err(error) => {
                debug!(key = %self.key, error = %ErrorKind::of(error), "Guarded call failed");
                self.record_failure();
            }
        }
        result
    }

    /// Admit or reject a call, moving Open → HalfOpen once the cool-down elapsed
    fn try_acquire<E>(&self) -> Result<(), ResilienceError<E>> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let elapsed = inner
                .last_failure
                .map_or(Duration::ZERO, |at| at.elapsed());

            if elapsed >= self.config.reset_timeout {
                inner.state = CircuitState::HalfOpen;
                inner.success_count = 0;
                info!(key = %self.key, "Circuit breaker half-open, testing");
            } else {
                inner.rejected_calls += 1;
                return Err(ResilienceError::CircuitOpen {
                    key: self.key.clone(),
                    retry_after: self.config.reset_timeout - elapsed,
                });
            }
        }

        inner.total_calls += 1;
        Ok(())
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.total_successes += 1;

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                debug!(
                    key = %self.key,
                    successes = inner.success_count,
                    threshold = self.config.success_threshold,
                    "Circuit breaker half-open success"
                );

                if inner.success_count >= self.config.success_threshold {
                    Self::close(&mut inner);
                    info!(key = %self.key, "Circuit breaker closed");
                }
            }
            CircuitState::Open => {
                // Settled after the circuit tripped; the trip stands
            }
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.total_failures += 1;
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.last_failure_at = Some(Utc::now());

        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count >= self.config.failure_threshold {
                    self.open(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                debug!(key = %self.key, "Circuit breaker half-open failure, reopening");
                self.open(&mut inner);
            }
            CircuitState::Open => {}
        }
    }

    fn open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.success_count = 0;
        inner.times_opened += 1;

        warn!(
            key = %self.key,
            failures = inner.failure_count,
            threshold = self.config.failure_threshold,
            reset_timeout_ms = self.config.reset_timeout.as_millis(),
            "Circuit breaker opened"
        );
    }

    fn close(inner: &mut BreakerInner) {
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
    }

    /// Reset the circuit breaker to closed state with zeroed counters
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        Self::close(&mut inner);
        inner.last_failure = None;
        info!(key = %self.key, "Circuit breaker reset");
    }

    /// Force the circuit open (for manual intervention)
    pub fn force_open(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure = Some(Instant::now());
        inner.last_failure_at = Some(Utc::now());
        if inner.state != CircuitState::Open {
            self.open(&mut inner);
        }
    }

    /// Get current statistics
    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        CircuitBreakerStats {
            key: self.key.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            total_calls: inner.total_calls,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            rejected_calls: inner.rejected_calls,
            times_opened: inner.times_opened,
            last_failure_at: inner.last_failure_at,
        }
    }
}

/// Short label for a failure, used in logs
struct ErrorKind(&'static str);

impl ErrorKind {
    fn of<E>(error: &ResilienceError<E>) -> Self {
        Self(match error {
            ResilienceError::Timeout { .. } => "timeout",
            ResilienceError::RetryExhausted { .. } => "retry_exhausted",
            ResilienceError::CircuitOpen { .. } => "circuit_open",
            ResilienceError::NotRegistered { .. } => "not_registered",
            ResilienceError::Operation(_) => "operation",
        })
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    /// Dependency key
    pub key: String,
    /// Current state
    pub state: CircuitState,
    /// Failures counted towards the threshold
    pub failure_count: u32,
    /// Consecutive successes while half-open
    pub success_count: u32,
    /// Calls admitted through the breaker
    pub total_calls: u64,
    /// Successful calls
    pub total_successes: u64,
    /// Failed calls
    pub total_failures: u64,
    /// Calls rejected while open
    pub rejected_calls: u64,
    /// Number of Closed/HalfOpen → Open transitions
    pub times_opened: u64,
    /// Wall-clock time of the most recent failure
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl CircuitBreakerStats {
    /// Calculate failure rate over admitted calls
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.total_failures as f64 / self.total_calls as f64
        }
    }
}
