//! Per-call timeout management.

use crate::error::ResilienceError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Race `future` against a timer of `timeout`.
///
/// Whichever side loses is dropped: the timer when the future settles first,
/// the future (and whatever it would have produced) when the timer fires.
pub async fn with_timeout<T, E, Fut>(timeout: Duration, future: Fut) -> Result<T, ResilienceError<E>>
where
    Fut: Future<Output = Result<T, ResilienceError<E>>>,
{
    if let Ok(result) = tokio::time::timeout(timeout, future).await {
        result
    } else {
        debug!(timeout_ms = timeout.as_millis(), "Guarded call timed out");
        Err(ResilienceError::timeout(timeout))
    }
}
