//! # Portal Resilience
//!
//! Resilience patterns for outbound calls made by the client portal:
//! - Circuit breaker for isolating failing dependencies
//! - Retry handler with exponential backoff
//! - Timeout management
//! - A named breaker registry composing all three

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit_breaker;
pub mod error;
pub mod retry;
pub mod service;
pub mod timeout;

// Re-export main types
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use error::{ResilienceError, ResilienceResult};
pub use retry::{RetryConfig, RetryHandler, RetryHandlerBuilder};
pub use service::{ExecuteOptions, ResilienceService};
pub use timeout::with_timeout;
