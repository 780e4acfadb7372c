//! Dashboard integration tests
//!
//! Aggregation over the seeded dataset, cache reuse, write-then-invalidate
//! flows and store outages behind a circuit breaker.

use crate::fixtures::*;
use crate::helpers::*;
use portal_dashboard::{
    DashboardConfig, DashboardService, InvalidationScope, Pagination, ProjectFilter, ProjectStatus,
};
use portal_resilience::{CircuitBreakerConfig, CircuitState, ExecuteOptions, ResilienceService};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn counts(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

#[tokio::test]
async fn test_global_stats_over_seeded_data() {
    init_tracing();
    let service = dashboard(seeded_store());

    let stats = service.global_stats().await.unwrap();

    assert_eq!(stats.clients.total, 3);
    assert_eq!(stats.clients.active, 2);
    assert_eq!(stats.projects.total, 4);
    assert_eq!(stats.projects.active, 2);
    assert_eq!(stats.projects.completed, 1);
    assert!((stats.projects.completion_rate - 25.0).abs() < f64::EPSILON);
    assert_eq!(
        stats.projects.by_status,
        counts(&[("active", 2), ("completed", 1), ("planning", 1)])
    );
    assert_eq!(stats.tickets.total, 4);
    assert_eq!(stats.tickets.open, 2);
    assert_eq!(stats.tickets.resolved, 2);
    assert_eq!(stats.tickets.open_by_priority, counts(&[("high", 1), ("urgent", 1)]));
    assert!((stats.revenue.total_paid - 3_000.0).abs() < f64::EPSILON);
    assert!((stats.revenue.outstanding - 750.0).abs() < f64::EPSILON);
    assert!((stats.revenue.average_invoice - 1_500.0).abs() < f64::EPSILON);
    assert!((stats.revenue.collection_rate - 80.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_user_dashboard_is_scoped_to_client() {
    let service = dashboard(seeded_store());

    let acme = service.user_dashboard(ACME).await.unwrap();
    assert_eq!(acme.user_id, ACME);
    assert_eq!(acme.projects.total, 2);
    assert_eq!(acme.tickets.open, 1);
    assert!((acme.revenue.total_paid - 1_000.0).abs() < f64::EPSILON);
    assert!((acme.revenue.outstanding - 500.0).abs() < f64::EPSILON);
    let recent: Vec<u64> = acme.recent_projects.iter().map(|p| p.id).collect();
    assert_eq!(recent, vec![1, 2], "newest project first");

    let initech = service.user_dashboard(INITECH).await.unwrap();
    assert_eq!(initech.projects.total, 0);
    assert!(initech.recent_projects.is_empty());
    assert!(initech.revenue.collection_rate.abs() < f64::EPSILON);
}

/// Repeated reads are served from cache until a write invalidates them
#[tokio::test]
async fn test_invoice_payment_flow() {
    let store = seeded_store();
    let service = dashboard(store.clone());

    let before = service.global_stats().await.unwrap();
    let _ = service.user_dashboard(ACME).await.unwrap();
    let _ = service.user_dashboard(GLOBEX).await.unwrap();
    let queries = store.query_count();

    let again = service.global_stats().await.unwrap();
    assert_eq!(again, before);
    assert_eq!(store.query_count(), queries, "cached read must not hit the store");

    assert!(store.mark_invoice_paid(2));

    // Stale until invalidated
    let stale = service.global_stats().await.unwrap();
    assert!((stale.revenue.total_paid - 3_000.0).abs() < f64::EPSILON);

    let deleted = service.invalidate_caches(InvalidationScope::Global).await
        + service.invalidate_caches(InvalidationScope::User(ACME)).await;
    assert_eq!(deleted, 2);

    let fresh = service.global_stats().await.unwrap();
    assert!((fresh.revenue.total_paid - 3_500.0).abs() < f64::EPSILON);
    let acme = service.user_dashboard(ACME).await.unwrap();
    assert!(acme.revenue.outstanding.abs() < f64::EPSILON);

    // Globex was not invalidated and is still cached
    let queries = store.query_count();
    let _ = service.user_dashboard(GLOBEX).await.unwrap();
    assert_eq!(store.query_count(), queries);
}

#[tokio::test]
async fn test_project_list_paging_and_invalidation() {
    let store = seeded_store();
    let service = dashboard(store.clone());

    let websites = ProjectFilter::new().with_search("WEBSITE");
    let page = service.project_list(&websites, Pagination::new(1, 1)).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items[0].name, "Website Audit");

    let second = service.project_list(&websites, Pagination::new(2, 1)).await.unwrap();
    assert_eq!(second.items[0].name, "Website Redesign");

    let active_globex = ProjectFilter::new().for_client(GLOBEX).with_status(ProjectStatus::Active);
    let page = service.project_list(&active_globex, Pagination::default()).await.unwrap();
    assert_eq!(page.total, 1);

    let empty = service
        .project_list(&ProjectFilter::new().with_search("nothing"), Pagination::default())
        .await
        .unwrap();
    assert_eq!(empty.total, 0);
    assert_eq!(empty.total_pages, 0);

    assert_eq!(service.invalidate_caches(InvalidationScope::ProjectLists).await, 4);
    assert_eq!(service.invalidate_caches(InvalidationScope::ProjectLists).await, 0);
}

#[tokio::test]
async fn test_invalidate_all() {
    let service = dashboard(seeded_store());
    let _ = service.global_stats().await.unwrap();
    let _ = service.user_dashboard(ACME).await.unwrap();
    let _ = service
        .project_list(&ProjectFilter::new(), Pagination::default())
        .await
        .unwrap();

    assert_eq!(service.invalidate_caches(InvalidationScope::All).await, 3);
}

/// A store outage trips the breaker; cached aggregates keep being served and
/// the dashboard recovers once the breaker closes again
#[tokio::test(start_paused = true)]
async fn test_store_outage_behind_breaker() {
    init_tracing();
    let store = seeded_store();
    let resilience = Arc::new(ResilienceService::new());
    resilience.register(
        "analytics-db",
        CircuitBreakerConfig::default()
            .with_failure_threshold(1)
            .with_success_threshold(1)
            .with_reset_timeout(Duration::from_secs(5)),
    );
    let service = DashboardService::new(memory_cache(), store.clone(), DashboardConfig::default())
        .with_resilience(resilience.clone(), "analytics-db", ExecuteOptions::new());

    let cached = service.global_stats().await.unwrap();

    store.set_unavailable(true);
    let err = service.user_dashboard(ACME).await.unwrap_err();
    assert_eq!(err.status_code(), 503);
    assert_eq!(resilience.circuit_breaker_state("analytics-db").unwrap(), CircuitState::Open);

    // The open breaker short-circuits without querying the store
    let queries = store.query_count();
    let err = service.user_dashboard(ACME).await.unwrap_err();
    assert_eq!(err.status_code(), 503);
    assert_eq!(store.query_count(), queries);

    // Cached aggregates are unaffected by the outage
    assert_eq!(service.global_stats().await.unwrap(), cached);

    store.set_unavailable(false);
    tokio::time::advance(Duration::from_secs(5)).await;

    let acme = service.user_dashboard(ACME).await.unwrap();
    assert_eq!(acme.projects.total, 2);
    assert_eq!(resilience.circuit_breaker_state("analytics-db").unwrap(), CircuitState::Closed);

    let metrics = service.cache_metrics().await;
    assert!(metrics.health.is_healthy);
    assert_eq!(metrics.stats.errors, 0);
}
