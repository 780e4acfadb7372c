//! # Client Portal Core
//!
//! Resilience, caching and dashboard aggregation for the client portal.
//!
//! The binary seeds an in-memory analytics store, serves a round of
//! dashboard queries through the cache and the circuit breaker, and prints
//! the resulting aggregates and cache metrics as JSON.
//!
//! ## Usage
//!
//! ```bash
//! # Defaults plus PORTAL_* environment overrides
//! client-portal-core
//!
//! # With a YAML or TOML config file
//! client-portal-core /path/to/portal.yaml
//!
//! # With environment overrides
//! PORTAL_LOG_FORMAT=json PORTAL_CACHE_DEFAULT_TTL=30s client-portal-core
//! ```

use anyhow::Context;
use chrono::{Duration as ChronoDuration, Utc};
use portal_cache::CacheService;
use portal_config::{ConfigLoader, PortalConfig};
use portal_dashboard::{
    Client, ClientStatus, DashboardService, InMemoryAnalyticsStore, InvalidationScope, Invoice,
    InvoiceStatus, Pagination, Project, ProjectFilter, ProjectStatus, Ticket, TicketPriority,
    TicketStatus,
};
use portal_resilience::{CircuitBreakerConfig, ExecuteOptions};
use portal_telemetry::init_logging;
use std::env;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Breaker guarding analytics store queries
const STORE_BREAKER: &str = "analytics-db";

/// Application entry point
#[tokio::main]
async fn main() {
    let config = match load_config().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting client portal core");

    if let Err(e) = run(config).await {
        error!(error = %e, "Application failed");
        std::process::exit(1);
    }
}

/// Load configuration from the optional path argument and the environment
async fn load_config() -> anyhow::Result<PortalConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = env::args().nth(1) {
        loader = loader.with_file(path);
    }
    loader.load().await.context("loading portal configuration")
}

/// Main application logic
async fn run(config: PortalConfig) -> anyhow::Result<()> {
    let resilience = Arc::new(config.resilience.build_service());
    if !resilience.contains(STORE_BREAKER) {
        resilience.register(STORE_BREAKER, CircuitBreakerConfig::default());
    }

    let cache = CacheService::from_config(&config.cache)
        .await
        .context("connecting cache backend")?;

    let store = Arc::new(InMemoryAnalyticsStore::new());
    seed_store(&store);

    let dashboard = DashboardService::new(cache, store.clone(), config.dashboard.clone()).with_resilience(
        Arc::clone(&resilience),
        STORE_BREAKER,
        ExecuteOptions::new().with_retry(config.resilience.default_retry.clone()),
    );

    info!("Dashboard service initialized");

    let global = dashboard.global_stats().await?;
    // Second read is served from cache
    let _ = dashboard.global_stats().await?;
    print_json("global_stats", &global)?;

    let user = dashboard.user_dashboard(1).await?;
    print_json("user_dashboard", &user)?;

    let page = dashboard
        .project_list(&ProjectFilter::new().with_status(ProjectStatus::Active), Pagination::default())
        .await?;
    print_json("active_projects", &page)?;

    if store.mark_invoice_paid(2) {
        let deleted = dashboard.invalidate_caches(InvalidationScope::All).await;
        info!(deleted, "Invoice paid, dashboard caches invalidated");
    }
    let refreshed = dashboard.global_stats().await?;
    print_json("global_stats_after_payment", &refreshed.revenue)?;

    let metrics = dashboard.cache_metrics().await;
    for recommendation in &metrics.recommendations {
        warn!(%recommendation, "Cache recommendation");
    }
    print_json("cache_metrics", &metrics)?;
    print_json("circuit_breakers", &resilience.all_stats())?;

    info!("Client portal core finished");
    Ok(())
}

fn print_json<T: serde::Serialize>(label: &str, value: &T) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(value).context("serializing report")?;
    println!("== {label}\n{body}");
    Ok(())
}

/// Populate the store with a small demo portfolio
fn seed_store(store: &InMemoryAnalyticsStore) {
    let now = Utc::now();
    let days = ChronoDuration::days;

    let clients = [
        (1, "Northwind", ClientStatus::Active, 420),
        (2, "Contoso", ClientStatus::Active, 12),
        (3, "Fabrikam", ClientStatus::Inactive, 230),
    ];
    for (id, name, status, age) in clients {
        store.insert_client(Client {
            id,
            name: name.to_string(),
            status,
            created_at: now - days(age),
        });
    }

    let projects = [
        (1, 1, "Storefront Rebuild", ProjectStatus::Active, 18_000.0, 45),
        (2, 1, "Loyalty App", ProjectStatus::Completed, 32_000.0, 160),
        (3, 2, "Data Migration", ProjectStatus::Planning, 9_500.0, 6),
        (4, 2, "Support Portal", ProjectStatus::Active, 14_000.0, 10),
        (5, 3, "Intranet", ProjectStatus::Cancelled, 4_000.0, 200),
    ];
    for (id, client_id, name, status, budget, age) in projects {
        store.insert_project(Project {
            id,
            client_id,
            name: name.to_string(),
            status,
            budget,
            created_at: now - days(age),
        });
    }

    let tickets = [
        (1, 1, 1, TicketStatus::Open, TicketPriority::High, 2),
        (2, 1, 1, TicketStatus::Resolved, TicketPriority::Medium, 20),
        (3, 4, 2, TicketStatus::InProgress, TicketPriority::Urgent, 1),
        (4, 2, 1, TicketStatus::Closed, TicketPriority::Low, 90),
    ];
    for (id, project_id, client_id, status, priority, age) in tickets {
        store.insert_ticket(Ticket {
            id,
            project_id,
            client_id,
            status,
            priority,
            created_at: now - days(age),
        });
    }

    let invoices = [
        (1, 2, 1, 16_000.0, InvoiceStatus::Paid, 120),
        (2, 1, 1, 9_000.0, InvoiceStatus::Sent, 14),
        (3, 4, 2, 7_000.0, InvoiceStatus::Paid, 3),
        (4, 3, 2, 2_500.0, InvoiceStatus::Overdue, 40),
        (5, 4, 2, 7_000.0, InvoiceStatus::Draft, 1),
    ];
    for (id, project_id, client_id, amount, status, age) in invoices {
        store.insert_invoice(Invoice {
            id,
            project_id,
            client_id,
            amount,
            status,
            created_at: now - days(age),
        });
    }
}
