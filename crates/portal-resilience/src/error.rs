//! Error types surfaced by the resilience layer.

use std::time::Duration;
use thiserror::Error;

/// Errors produced when running an operation through a resilience primitive.
///
/// `E` is the error type of the wrapped operation. Policy decisions (open
/// circuit, timeout, exhausted retries, unknown dependency) get their own
/// variants so callers can tell them apart from the operation's own failure.
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// The circuit breaker is open; the operation was never invoked.
    #[error("Circuit breaker is OPEN for {key}")]
    CircuitOpen {
        /// Dependency key of the breaker
        key: String,
        /// Time left until the breaker will allow a probe
        retry_after: Duration,
    },

    /// The operation did not settle within its time budget.
    #[error("Timeout after {timeout_ms}ms")]
    Timeout {
        /// Budget that was exceeded, in milliseconds
        timeout_ms: u64,
    },

    /// Every retry attempt failed.
    #[error("Operation failed after {attempts} attempts")]
    RetryExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error returned by the final attempt
        last_error: E,
    },

    /// No breaker is registered under the requested key.
    #[error("Circuit breaker not found for key: {key}")]
    NotRegistered {
        /// The unknown key
        key: String,
    },

    /// The operation itself failed.
    #[error("{0}")]
    Operation(E),
}

impl<E> ResilienceError<E> {
    /// Create a timeout error for the given budget
    #[must_use]
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Check whether this error is a circuit-open rejection
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Check whether this error is a timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check whether retries were exhausted
    #[must_use]
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    /// Borrow the underlying operation error, if any
    #[must_use]
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(e) | Self::RetryExhausted { last_error: e, .. } => Some(e),
            _ => None,
        }
    }

    /// HTTP status an API collaborator should answer with.
    ///
    /// `None` means the status depends on the operation's own error.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::CircuitOpen { .. } | Self::RetryExhausted { .. } => Some(503),
            Self::Timeout { .. } => Some(504),
            Self::NotRegistered { .. } => Some(500),
            Self::Operation(_) => None,
        }
    }

    /// Retry-after hint for 503 responses
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Map the wrapped operation error, keeping policy variants intact
    pub fn map_operation<F, O>(self, f: O) -> ResilienceError<F>
    where
        O: FnOnce(E) -> F,
    {
        match self {
            Self::CircuitOpen { key, retry_after } => ResilienceError::CircuitOpen { key, retry_after },
            Self::Timeout { timeout_ms } => ResilienceError::Timeout { timeout_ms },
            Self::RetryExhausted {
                attempts,
                last_error,
            } => ResilienceError::RetryExhausted {
                attempts,
                last_error: f(last_error),
            },
            Self::NotRegistered { key } => ResilienceError::NotRegistered { key },
            Self::Operation(e) => ResilienceError::Operation(f(e)),
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;
