//! Integration tests for the client portal core
//!
//! Exercises the crates together:
//! - Circuit breaking and retries through the resilience registry
//! - Cache-aside behavior against healthy and failing backends
//! - Dashboard aggregation, caching and invalidation
//! - Layered configuration loading

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;

#[cfg(test)]
mod cache_tests;
#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod dashboard_tests;
#[cfg(test)]
mod resilience_tests;
