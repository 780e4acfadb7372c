//! # Portal Dashboard
//!
//! Expensive dashboard aggregations served through the portal cache.
//!
//! [`DashboardService`] answers three query families, each with its own key
//! template, TTL and invalidation tags:
//!
//! | Query | Key | Default TTL | Tags |
//! |-------|-----|-------------|------|
//! | [`DashboardService::global_stats`] | `global-stats` | 5 min | `dashboard-global` |
//! | [`DashboardService::user_dashboard`] | `user-dashboard:{id}` | 2 min | `dashboard-user`, `dashboard-user:{id}` |
//! | [`DashboardService::project_list`] | `project-list:{filter}:page=..` | 10 min | `project-list` |
//!
//! On a miss the aggregation runs its [`AnalyticsStore`] sub-queries
//! concurrently, optionally through a [`portal_resilience::ResilienceService`]
//! breaker. Write paths evict stale aggregates with
//! [`DashboardService::invalidate_caches`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod model;
pub mod ratios;
pub mod report;
pub mod service;
pub mod store;

pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult, StoreError};
pub use model::{
    Client, ClientStatus, Invoice, InvoiceStatus, Pagination, Project, ProjectFilter, ProjectStatus, Ticket,
    TicketPriority, TicketStatus,
};
pub use report::{
    CacheMetrics, ClientStats, GlobalStats, ProjectListPage, ProjectStats, RevenueStats, TicketStats,
    UserDashboard,
};
pub use service::{DashboardService, InvalidationScope};
pub use store::{AnalyticsStore, Entity, GroupBy, InMemoryAnalyticsStore, ProjectPage, RecordFilter};
