//! Error types for the dashboard layer.

use portal_resilience::ResilienceError;
use thiserror::Error;

/// Errors returned by an [`crate::AnalyticsStore`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached
    #[error("Analytics store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed a query
    #[error("Analytics query failed: {0}")]
    Query(String),

    /// The query is not supported by the store
    #[error("Invalid analytics query: {0}")]
    InvalidQuery(String),
}

impl StoreError {
    /// Check if retrying may succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors returned by [`crate::DashboardService`] queries
#[derive(Debug, Error)]
pub enum DashboardError {
    /// An aggregate query failed
    #[error(transparent)]
    Store(StoreError),

    /// The resilience layer refused or gave up on a store call
    #[error("Analytics store call rejected: {0}")]
    Resilience(ResilienceError<StoreError>),
}

impl DashboardError {
    /// HTTP status an API layer should answer with
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Store(StoreError::Unavailable(_)) => 503,
            Self::Store(StoreError::InvalidQuery(_)) => 400,
            Self::Store(StoreError::Query(_)) => 500,
            Self::Resilience(e) => e.status_code().unwrap_or(500),
        }
    }

    /// The underlying store error, if the failure came from the store itself
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store(e) => Some(e),
            Self::Resilience(e) => e.operation_error(),
        }
    }
}

impl From<StoreError> for DashboardError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<ResilienceError<StoreError>> for DashboardError {
    fn from(e: ResilienceError<StoreError>) -> Self {
        match e {
            ResilienceError::Operation(inner) => Self::Store(inner),
            other => Self::Resilience(other),
        }
    }
}

/// Result type for dashboard queries
pub type DashboardResult<T> = Result<T, DashboardError>;
