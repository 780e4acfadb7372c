//! Retry handler with exponential backoff.
//!
//! Retries a fallible async operation, waiting
//! `min(base_delay * multiplier^(attempt - 1), max_delay)` between attempts.
//! A caller-supplied predicate can stop retrying early for errors that will
//! not go away on their own.

use crate::error::ResilienceError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,
    /// Upper bound for any single delay
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 - 1.0); zero keeps delays exact
    #[serde(default)]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: 0.0,
        }
    }
}

/// Stateless retry strategy
#[derive(Debug, Clone)]
pub struct RetryHandler {
    config: RetryConfig,
}

impl RetryHandler {
    /// Create a new retry handler with the given configuration
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Create a handler with custom max attempts
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(RetryConfig {
            max_attempts,
            ..Default::default()
        })
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Calculate delay to wait after the given failed attempt (1-indexed)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base = self.config.base_delay.as_millis() as f64;
        let max = self.config.max_delay.as_millis() as f64;
        let delay = (base * self.config.backoff_multiplier.powi(exponent)).min(max);

        let delay = if self.config.jitter > 0.0 {
            let jitter_range = delay * self.config.jitter.min(1.0);
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (delay + jitter).clamp(0.0, max)
        } else {
            delay
        };

        Duration::from_millis(delay as u64)
    }

    /// Execute an operation, treating every error as retryable
    ///
    /// # Errors
    /// Returns `RetryExhausted` carrying the final error once all attempts fail
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_if(operation, |_: &E| true).await
    }

    /// Execute an operation, retrying only errors accepted by `is_retryable`
    ///
    /// # Errors
    /// Returns `Operation` with the unmodified error as soon as `is_retryable`
    /// rejects it, or `RetryExhausted` once all attempts fail.
    pub async fn execute_if<F, Fut, T, E, P>(
        &self,
        operation: F,
        is_retryable: P,
    ) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(attempt = attempt, "Retry succeeded");
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !is_retryable(&error) {
                        debug!(attempt = attempt, error = %error, "Error is not retryable");
                        return Err(ResilienceError::Operation(error));
                    }

                    if attempt >= max_attempts {
                        warn!(attempts = attempt, error = %error, "Retry attempts exhausted");
                        return Err(ResilienceError::RetryExhausted {
                            attempts: attempt,
                            last_error: error,
                        });
                    }

                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "Retrying after error"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Builder for retry handler
#[derive(Debug, Default)]
pub struct RetryHandlerBuilder {
    config: RetryConfig,
}

impl RetryHandlerBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max attempts
    #[must_use]
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    /// Set base delay
    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    /// Set max delay
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.backoff_multiplier = multiplier;
        self
    }

    /// Set jitter factor
    #[must_use]
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.config.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Build the handler
    #[must_use]
    pub fn build(self) -> RetryHandler {
        RetryHandler::new(self.config)
    }
}
