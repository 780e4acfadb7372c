//! Resilience integration tests
//!
//! Breaker lifecycle and retry behavior through the shared registry,
//! driven with paused tokio time.

use crate::helpers::*;
use portal_resilience::{
    CircuitBreakerConfig, CircuitState, ExecuteOptions, ResilienceError, ResilienceService,
    RetryConfig,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

const KEY: &str = "billing-api";

fn registry() -> ResilienceService {
    init_tracing();
    let service = ResilienceService::new();
    service.register(
        KEY,
        CircuitBreakerConfig::default()
            .with_failure_threshold(3)
            .with_success_threshold(2)
            .with_reset_timeout(Duration::from_millis(5000)),
    );
    service
}

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(1),
        backoff_multiplier: 2.0,
        jitter: 0.0,
    }
}

/// Three failures trip the breaker, it rejects until the reset timeout,
/// then two successful probes close it again
#[tokio::test(start_paused = true)]
async fn test_breaker_full_lifecycle() {
    let service = registry();
    let dependency = FlakyDependency::down();

    for _ in 0..3 {
        let err = service
            .execute(KEY, || dependency.call(), ExecuteOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResilienceError::Operation(DependencyError::ConnectionReset)));
    }
    assert_eq!(service.circuit_breaker_state(KEY).unwrap(), CircuitState::Open);

    let err = service
        .execute(KEY, || dependency.call(), ExecuteOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(dependency.calls(), 3, "open breaker must not invoke the dependency");
    assert!(err.retry_after().unwrap() <= Duration::from_millis(5000));

    tokio::time::advance(Duration::from_millis(4999)).await;
    assert!(service
        .execute(KEY, || dependency.call(), ExecuteOptions::new())
        .await
        .unwrap_err()
        .is_circuit_open());

    tokio::time::advance(Duration::from_millis(1)).await;
    dependency.recover();

    assert_eq!(
        service.execute(KEY, || dependency.call(), ExecuteOptions::new()).await.unwrap(),
        "ok"
    );
    assert_eq!(service.circuit_breaker_state(KEY).unwrap(), CircuitState::HalfOpen);

    service
        .execute(KEY, || dependency.call(), ExecuteOptions::new())
        .await
        .unwrap();
    assert_eq!(service.circuit_breaker_state(KEY).unwrap(), CircuitState::Closed);

    let stats = service.circuit_breaker_stats(KEY).unwrap();
    assert_eq!(stats.times_opened, 1);
    assert_eq!(stats.rejected_calls, 2);
    assert_eq!(stats.total_failures, 3);
    assert_eq!(stats.total_successes, 2);
}

/// A failed half-open probe reopens the breaker for another full reset timeout
#[tokio::test(start_paused = true)]
async fn test_half_open_failure_reopens() {
    let service = registry();
    let dependency = FlakyDependency::down();

    for _ in 0..3 {
        let _ = service.execute(KEY, || dependency.call(), ExecuteOptions::new()).await;
    }
    tokio::time::advance(Duration::from_millis(5000)).await;

    let err = service
        .execute(KEY, || dependency.call(), ExecuteOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ResilienceError::Operation(_)));
    assert_eq!(service.circuit_breaker_state(KEY).unwrap(), CircuitState::Open);
    assert_eq!(service.circuit_breaker_stats(KEY).unwrap().times_opened, 2);

    tokio::time::advance(Duration::from_millis(2500)).await;
    assert!(service
        .execute(KEY, || dependency.call(), ExecuteOptions::new())
        .await
        .unwrap_err()
        .is_circuit_open());
}

/// Two connection resets followed by a success count as one successful breaker call
#[tokio::test(start_paused = true)]
async fn test_retry_recovers_from_connection_resets() {
    let service = registry();
    let dependency = FlakyDependency::failing_first(2);

    let result = service
        .execute_if(
            KEY,
            || dependency.call(),
            ExecuteOptions::new().with_retry(fast_retry(3)),
            DependencyError::is_retryable,
        )
        .await;

    assert_eq!(result.unwrap(), "ok");
    assert_eq!(dependency.calls(), 3);

    let stats = service.circuit_breaker_stats(KEY).unwrap();
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.total_successes, 1);
    assert_eq!(stats.total_failures, 0);
}

/// Exhausted retries surface the last error and count as one breaker failure
#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_counts_once() {
    let service = registry();
    let dependency = FlakyDependency::down();

    let err = service
        .execute(KEY, || dependency.call(), ExecuteOptions::new().with_retry(fast_retry(3)))
        .await
        .unwrap_err();

    match err {
        ResilienceError::RetryExhausted { attempts, last_error } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_error, DependencyError::ConnectionReset);
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(dependency.calls(), 3);
    assert_eq!(service.circuit_breaker_stats(KEY).unwrap().failure_count, 1);
    assert_eq!(service.circuit_breaker_state(KEY).unwrap(), CircuitState::Closed);
}

/// Non-retryable errors are returned after a single attempt
#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_is_not_retried() {
    let service = registry();
    let calls = std::sync::atomic::AtomicU32::new(0);
    let counter = &calls;

    let err = service
        .execute_if(
            KEY,
            move || async move {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err::<(), _>(DependencyError::BadRequest("missing invoice id".into()))
            },
            ExecuteOptions::new().with_retry(fast_retry(5)),
            DependencyError::is_retryable,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ResilienceError::Operation(DependencyError::BadRequest(_))));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

/// A hung dependency is cut off by the call timeout and counts as a failure
#[tokio::test(start_paused = true)]
async fn test_timeout_counts_as_failure() {
    let service = registry();

    let err = service
        .execute(
            KEY,
            || async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, DependencyError>("late")
            },
            ExecuteOptions::new().with_timeout(Duration::from_millis(250)),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(service.circuit_breaker_stats(KEY).unwrap().failure_count, 1);
}

/// Breakers are isolated per key, and unknown keys are reported
#[tokio::test(start_paused = true)]
async fn test_registry_isolation_and_reset() {
    let service = registry();
    service.register("analytics-db", CircuitBreakerConfig::default().with_failure_threshold(1));
    let dependency = FlakyDependency::down();

    let _ = service
        .execute("analytics-db", || dependency.call(), ExecuteOptions::new())
        .await;
    assert_eq!(service.circuit_breaker_state("analytics-db").unwrap(), CircuitState::Open);
    assert_eq!(service.circuit_breaker_state(KEY).unwrap(), CircuitState::Closed);

    service.reset_circuit_breaker("analytics-db").unwrap();
    assert_eq!(service.circuit_breaker_state("analytics-db").unwrap(), CircuitState::Closed);

    let err = service
        .execute("search", || dependency.call(), ExecuteOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ResilienceError::NotRegistered { .. }));
    assert!(service.reset_circuit_breaker("search").is_err());

    let keys: Vec<String> = service.all_stats().into_iter().map(|s| s.key).collect();
    assert_eq!(keys, vec!["analytics-db".to_string(), KEY.to_string()]);
}
