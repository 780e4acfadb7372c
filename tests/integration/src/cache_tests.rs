//! Cache integration tests
//!
//! Cache-aside reads, TTL expiry, tag invalidation across namespaces and
//! behavior when the backend goes away.

use crate::helpers::*;
use portal_cache::{CacheConfig, CacheService, SetOptions};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Summary {
    open_tickets: u64,
    label: String,
}

fn summary(open_tickets: u64) -> Summary {
    Summary {
        open_tickets,
        label: format!("{open_tickets} open"),
    }
}

fn shared_backend_services() -> (Arc<SwitchableBackend>, CacheService) {
    init_tracing();
    let backend = Arc::new(SwitchableBackend::new());
    let cache = CacheService::new(backend.clone(), &CacheConfig::default());
    (backend, cache)
}

/// The fetcher runs once; later reads are served from the cache
#[tokio::test]
async fn test_cache_aside_fetches_once() {
    let (_, cache) = shared_backend_services();
    let fetches = AtomicU32::new(0);

    for _ in 0..3 {
        let counter = &fetches;
        let value = cache
            .get_or_set(
                "summary",
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(summary(4))
                },
                SetOptions::new().with_ttl(Duration::from_secs(60)),
            )
            .await
            .unwrap();
        assert_eq!(value, summary(4));
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.sets, 1);
    assert!((stats.hit_rate - 66.67).abs() < 0.01);
}

/// A fetcher error is returned unchanged and nothing is cached
#[tokio::test]
async fn test_fetch_error_is_not_cached() {
    let (_, cache) = shared_backend_services();

    let result: Result<Summary, &str> = cache
        .get_or_set("summary", || async { Err("database down") }, SetOptions::new())
        .await;
    assert_eq!(result.unwrap_err(), "database down");
    assert!(!cache.exists("summary").await);
    assert_eq!(cache.stats().sets, 0);
}

/// Entries disappear once their TTL passes
#[tokio::test(start_paused = true)]
async fn test_entries_expire_after_ttl() {
    let (_, cache) = shared_backend_services();

    assert!(cache.set("short", &summary(1), SetOptions::new().with_ttl(Duration::from_secs(2))).await);
    assert!(cache.set("long", &summary(2), SetOptions::new().with_ttl(Duration::from_secs(60))).await);

    tokio::time::advance(Duration::from_secs(3)).await;

    assert_eq!(cache.get::<Summary>("short").await, None);
    assert_eq!(cache.get::<Summary>("long").await, Some(summary(2)));
}

/// Tags are scoped to a namespace even when the backend is shared
#[tokio::test]
async fn test_tag_invalidation_respects_namespaces() {
    let (_, dashboards) = shared_backend_services();
    let reports = dashboards.namespaced("reports");

    let tagged = || SetOptions::new().with_tag("client-1");
    assert!(dashboards.set("a", &summary(1), tagged()).await);
    assert!(dashboards.set("b", &summary(2), tagged().with_tag("weekly")).await);
    assert!(dashboards.set("c", &summary(3), SetOptions::new().with_tag("weekly")).await);
    assert!(reports.set("a", &summary(9), tagged()).await);

    assert_eq!(dashboards.invalidate_by_tags(&["client-1"]).await, 2);
    assert!(!dashboards.exists("a").await);
    assert!(!dashboards.exists("b").await);
    assert!(dashboards.exists("c").await);
    assert_eq!(reports.get::<Summary>("a").await, Some(summary(9)));

    assert_eq!(dashboards.invalidate_by_tags(&["client-1", "weekly"]).await, 1);
    assert_eq!(dashboards.invalidate_by_tags::<&str>(&[]).await, 0);
}

/// Clearing one namespace leaves the others alone
#[tokio::test]
async fn test_clear_is_namespace_scoped() {
    let (_, dashboards) = shared_backend_services();
    let reports = dashboards.namespaced("reports");

    dashboards.set("x", &summary(1), SetOptions::new()).await;
    dashboards.set("y", &summary(2), SetOptions::new()).await;
    reports.set("x", &summary(3), SetOptions::new()).await;

    assert_eq!(dashboards.clear().await, 2);
    assert!(reports.exists("x").await);
    assert_eq!(dashboards.build_key("x"), "portal:cache:x");
    assert_eq!(reports.build_key("x"), "portal:reports:x");
}

/// With the backend down every read falls through to the fetcher and errors are counted
#[tokio::test]
async fn test_degrades_when_backend_is_down() {
    let (backend, cache) = shared_backend_services();
    cache.set("summary", &summary(5), SetOptions::new()).await;
    backend.set_down(true);

    let fetches = AtomicU32::new(0);
    for _ in 0..2 {
        let counter = &fetches;
        let value = cache
            .get_or_set(
                "summary",
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(summary(6))
                },
                SetOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(value, summary(6));
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
    assert!(!cache.delete("summary").await);

    let health = cache.health_check().await;
    assert!(!health.is_healthy);
    assert_eq!(health.backend, "switchable");
    assert!(health.error.is_some());

    let stats = cache.stats();
    // two failed reads, two failed writes, one failed delete
    assert_eq!(stats.errors, 5);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 0);

    backend.set_down(false);
    assert_eq!(cache.get::<Summary>("summary").await, Some(summary(5)));
    assert!(cache.health_check().await.is_healthy);
}

/// Resetting statistics zeroes the counters
#[tokio::test]
async fn test_reset_stats() {
    let (_, cache) = shared_backend_services();
    cache.set("k", &summary(1), SetOptions::new()).await;
    let _ = cache.get::<Summary>("k").await;
    let _ = cache.get::<Summary>("missing").await;
    assert_eq!(cache.stats().total_reads(), 2);

    cache.reset_stats();
    let stats = cache.stats();
    assert_eq!(stats.total_reads(), 0);
    assert_eq!(stats.sets, 0);
    assert!(stats.hit_rate.abs() < f64::EPSILON);
}
