//! Cached dashboard aggregations.
//!
//! Each query has a fixed key template, TTL and tag set. On a cache miss the
//! aggregation runs its store sub-queries concurrently and derives rates from
//! them. Nothing keeps these entries consistent with the store on its own:
//! every write path that changes projects, tickets, invoices or clients must
//! call [`DashboardService::invalidate_caches`] with the matching scope.

use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult, StoreError};
use crate::model::{ClientStatus, InvoiceStatus, Pagination, ProjectFilter, ProjectStatus, TicketStatus};
use crate::ratios::{average, growth, percentage, percentage_f64};
use crate::report::{
    CacheMetrics, ClientStats, GlobalStats, ProjectListPage, ProjectStats, RevenueStats, TicketStats,
    UserDashboard,
};
use crate::store::{AnalyticsStore, Entity, GroupBy, RecordFilter};
use chrono::{DateTime, Datelike, Months, Utc};
use portal_cache::{CacheService, SetOptions};
use portal_resilience::{ExecuteOptions, ResilienceService};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Cache key of the portal-wide statistics
pub const GLOBAL_STATS_KEY: &str = "global-stats";
/// Tag on the portal-wide statistics
pub const TAG_GLOBAL: &str = "dashboard-global";
/// Tag on every user dashboard
pub const TAG_USER: &str = "dashboard-user";
/// Tag on every project list page
pub const TAG_PROJECT_LIST: &str = "project-list";

/// Tag on one user's dashboard
#[must_use]
pub fn user_tag(user_id: u64) -> String {
    format!("{TAG_USER}:{user_id}")
}

/// Which cached aggregates to evict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "user_id")]
pub enum InvalidationScope {
    /// Everything the dashboard caches
    All,
    /// Portal-wide statistics only
    Global,
    /// Every user dashboard
    Users,
    /// One user's dashboard
    User(u64),
    /// Every project list page
    ProjectLists,
}

impl InvalidationScope {
    /// Tags evicted for this scope
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        match self {
            Self::All => vec![
                TAG_GLOBAL.to_string(),
                TAG_USER.to_string(),
                TAG_PROJECT_LIST.to_string(),
            ],
            Self::Global => vec![TAG_GLOBAL.to_string()],
            Self::Users => vec![TAG_USER.to_string()],
            Self::User(user_id) => vec![user_tag(*user_id)],
            Self::ProjectLists => vec![TAG_PROJECT_LIST.to_string()],
        }
    }
}

impl fmt::Display for InvalidationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Global => f.write_str("global"),
            Self::Users => f.write_str("users"),
            Self::User(user_id) => write!(f, "user:{user_id}"),
            Self::ProjectLists => f.write_str("project-lists"),
        }
    }
}

/// Calendar-month boundaries used for growth figures
#[derive(Debug, Clone, Copy)]
struct MonthWindow {
    now: DateTime<Utc>,
    this_month_start: DateTime<Utc>,
    last_month_start: DateTime<Utc>,
}

impl MonthWindow {
    fn at(now: DateTime<Utc>) -> Self {
        let this_month_start = now
            .date_naive()
            .with_day(1)
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map_or(now, |start| start.and_utc());
        let last_month_start = this_month_start
            .checked_sub_months(Months::new(1))
            .unwrap_or(this_month_start);

        Self {
            now,
            this_month_start,
            last_month_start,
        }
    }

    fn this_month(&self, filter: RecordFilter) -> RecordFilter {
        filter.created_since(self.this_month_start)
    }

    fn last_month(&self, filter: RecordFilter) -> RecordFilter {
        filter.created_between(self.last_month_start, self.this_month_start)
    }
}

struct StoreGuard {
    resilience: Arc<ResilienceService>,
    key: String,
    options: ExecuteOptions,
}

/// Dashboard queries served through the cache
pub struct DashboardService {
    cache: CacheService,
    store: Arc<dyn AnalyticsStore>,
    config: DashboardConfig,
    guard: Option<StoreGuard>,
}

impl fmt::Debug for DashboardService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardService")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .field("resilience_key", &self.guard.as_ref().map(|g| g.key.as_str()))
            .finish_non_exhaustive()
    }
}

impl DashboardService {
    /// Create a dashboard service
    pub fn new(cache: CacheService, store: Arc<dyn AnalyticsStore>, config: DashboardConfig) -> Self {
        Self {
            cache,
            store,
            config,
            guard: None,
        }
    }

    /// Route every store query through the breaker registered under `key`
    ///
    /// Only [`StoreError::Unavailable`] is retried when `options` carries a
    /// retry configuration.
    #[must_use]
    pub fn with_resilience(
        mut self,
        resilience: Arc<ResilienceService>,
        key: impl Into<String>,
        options: ExecuteOptions,
    ) -> Self {
        self.guard = Some(StoreGuard {
            resilience,
            key: key.into(),
            options,
        });
        self
    }

    /// Query configuration
    #[must_use]
    pub const fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Portal-wide statistics
    #[instrument(skip(self))]
    pub async fn global_stats(&self) -> DashboardResult<GlobalStats> {
        let options = SetOptions::new()
            .with_ttl(self.config.global_stats_ttl)
            .with_tag(TAG_GLOBAL);

        self.cache
            .get_or_set(GLOBAL_STATS_KEY, || self.compute_global_stats(), options)
            .await
    }

    /// Dashboard of one client
    #[instrument(skip(self))]
    pub async fn user_dashboard(&self, user_id: u64) -> DashboardResult<UserDashboard> {
        let key = format!("user-dashboard:{user_id}");
        let options = SetOptions::new()
            .with_ttl(self.config.user_dashboard_ttl)
            .with_tags([TAG_USER.to_string(), user_tag(user_id)]);

        self.cache
            .get_or_set(&key, || self.compute_user_dashboard(user_id), options)
            .await
    }

    /// One page of projects matching `filter`
    #[instrument(skip(self))]
    pub async fn project_list(
        &self,
        filter: &ProjectFilter,
        page: Pagination,
    ) -> DashboardResult<ProjectListPage> {
        let page = page.clamped(self.config.max_page_size);
        let key = format!(
            "project-list:{}:page={}:per_page={}",
            filter.cache_key(),
            page.page,
            page.per_page
        );
        let options = SetOptions::new()
            .with_ttl(self.config.project_list_ttl)
            .with_tag(TAG_PROJECT_LIST);

        self.cache
            .get_or_set(&key, || self.compute_project_list(filter, page), options)
            .await
    }

    /// Evict the cached aggregates in `scope`; returns the number of entries removed
    pub async fn invalidate_caches(&self, scope: InvalidationScope) -> u64 {
        let deleted = self.cache.invalidate_by_tags(&scope.tags()).await;
        info!(scope = %scope, deleted, "Dashboard caches invalidated");
        deleted
    }

    /// Cache counters, backend health and tuning hints
    pub async fn cache_metrics(&self) -> CacheMetrics {
        let stats = self.cache.stats();
        let health = self.cache.health_check().await;

        let mut recommendations = Vec::new();
        if stats.total_reads() > 0 && stats.hit_rate < 80.0 {
            recommendations.push(format!(
                "Cache hit rate is {:.1}%, below 80%; consider raising dashboard TTLs",
                stats.hit_rate
            ));
        }
        if stats.errors > 0 {
            recommendations.push(format!(
                "{} cache backend errors recorded; inspect the backing store",
                stats.errors
            ));
        }
        if !health.is_healthy {
            recommendations.push("Cache backend is unhealthy; check connectivity".to_string());
        }

        CacheMetrics {
            stats,
            health,
            recommendations,
        }
    }

    async fn compute_global_stats(&self) -> DashboardResult<GlobalStats> {
        debug!("Computing global dashboard statistics");
        let window = MonthWindow::at(Utc::now());

        let (clients, projects, tickets, revenue) = futures::try_join!(
            self.client_stats(&window),
            self.project_stats(None),
            self.ticket_stats(None),
            self.revenue_stats(None, &window),
        )?;

        Ok(GlobalStats {
            clients,
            projects,
            tickets,
            revenue,
            generated_at: window.now,
        })
    }

    async fn compute_user_dashboard(&self, user_id: u64) -> DashboardResult<UserDashboard> {
        debug!(user_id, "Computing user dashboard");
        let window = MonthWindow::at(Utc::now());
        let scope = Some(user_id);

        let recent_filter = ProjectFilter::new().for_client(user_id);
        let recent_page = Pagination::new(1, self.config.recent_projects_limit.max(1));
        let store = self.store.as_ref();
        let recent_filter = &recent_filter;

        let (projects, tickets, revenue, recent) = futures::try_join!(
            self.project_stats(scope),
            self.ticket_stats(scope),
            self.revenue_stats(scope, &window),
            self.guarded(move || store.list_projects(recent_filter, recent_page)),
        )?;

        Ok(UserDashboard {
            user_id,
            projects,
            tickets,
            revenue,
            recent_projects: recent.items,
            generated_at: window.now,
        })
    }

    async fn compute_project_list(
        &self,
        filter: &ProjectFilter,
        page: Pagination,
    ) -> DashboardResult<ProjectListPage> {
        debug!(filter = %filter.cache_key(), page = page.page, "Computing project list");
        let store = self.store.as_ref();
        let result = self.guarded(move || store.list_projects(filter, page)).await?;

        Ok(ProjectListPage {
            total_pages: result.total.div_ceil(u64::from(page.per_page)),
            items: result.items,
            total: result.total,
            page: page.page,
            per_page: page.per_page,
        })
    }

    async fn client_stats(&self, window: &MonthWindow) -> DashboardResult<ClientStats> {
        let store = self.store.as_ref();
        let all = &RecordFilter::all();
        let active = &RecordFilter::all().with_statuses(&[ClientStatus::Active.as_str()]);
        let this_month = &window.this_month(RecordFilter::all());
        let last_month = &window.last_month(RecordFilter::all());

        let (total, active, new_this_month, new_last_month) = futures::try_join!(
            self.guarded(move || store.count(Entity::Clients, all)),
            self.guarded(move || store.count(Entity::Clients, active)),
            self.guarded(move || store.count(Entity::Clients, this_month)),
            self.guarded(move || store.count(Entity::Clients, last_month)),
        )?;

        Ok(ClientStats {
            total,
            active,
            new_this_month,
            growth_pct: growth(new_this_month as f64, new_last_month as f64),
        })
    }

    async fn project_stats(&self, scope: Option<u64>) -> DashboardResult<ProjectStats> {
        let store = self.store.as_ref();
        let filter = &RecordFilter::all().scoped(scope);

        let by_status = self
            .guarded(move || store.group_count(Entity::Projects, GroupBy::Status, filter))
            .await?;

        let total: u64 = by_status.values().sum();
        let active = label_count(&by_status, ProjectStatus::Active.as_str());
        let completed = label_count(&by_status, ProjectStatus::Completed.as_str());

        Ok(ProjectStats {
            total,
            active,
            completed,
            completion_rate: percentage(completed, total),
            by_status,
        })
    }

    async fn ticket_stats(&self, scope: Option<u64>) -> DashboardResult<TicketStats> {
        const OPEN: [&str; 2] = [TicketStatus::Open.as_str(), TicketStatus::InProgress.as_str()];
        const RESOLVED: [&str; 2] = [TicketStatus::Resolved.as_str(), TicketStatus::Closed.as_str()];

        let store = self.store.as_ref();
        let all = &RecordFilter::all().scoped(scope);
        let open = &RecordFilter::all().scoped(scope).with_statuses(&OPEN);

        let (by_status, open_by_priority) = futures::try_join!(
            self.guarded(move || store.group_count(Entity::Tickets, GroupBy::Status, all)),
            self.guarded(move || store.group_count(Entity::Tickets, GroupBy::Priority, open)),
        )?;

        let total: u64 = by_status.values().sum();
        let open: u64 = OPEN.iter().map(|label| label_count(&by_status, label)).sum();
        let resolved: u64 = RESOLVED.iter().map(|label| label_count(&by_status, label)).sum();

        Ok(TicketStats {
            total,
            open,
            resolved,
            resolution_rate: percentage(resolved, total),
            open_by_priority,
        })
    }

    async fn revenue_stats(&self, scope: Option<u64>, window: &MonthWindow) -> DashboardResult<RevenueStats> {
        let store = self.store.as_ref();
        let paid = RecordFilter::all()
            .scoped(scope)
            .with_statuses(&[InvoiceStatus::Paid.as_str()]);
        let outstanding = &RecordFilter::all()
            .scoped(scope)
            .with_statuses(&[InvoiceStatus::Sent.as_str(), InvoiceStatus::Overdue.as_str()]);
        let paid_this_month = &window.this_month(paid.clone());
        let paid_last_month = &window.last_month(paid.clone());
        let paid = &paid;

        let (total_paid, outstanding, this_month, last_month, paid_count) = futures::try_join!(
            self.guarded(move || store.sum_invoice_amounts(paid)),
            self.guarded(move || store.sum_invoice_amounts(outstanding)),
            self.guarded(move || store.sum_invoice_amounts(paid_this_month)),
            self.guarded(move || store.sum_invoice_amounts(paid_last_month)),
            self.guarded(move || store.count(Entity::Invoices, paid)),
        )?;

        Ok(RevenueStats {
            total_paid,
            outstanding,
            this_month,
            last_month,
            growth_pct: growth(this_month, last_month),
            average_invoice: average(total_paid, paid_count),
            collection_rate: percentage_f64(total_paid, total_paid + outstanding),
        })
    }

    /// Run one store query, through the resilience layer when configured
    async fn guarded<T, F, Fut>(&self, query: F) -> DashboardResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match &self.guard {
            Some(guard) => guard
                .resilience
                .execute_if(&guard.key, query, guard.options.clone(), StoreError::is_transient)
                .await
                .map_err(DashboardError::from),
            None => query().await.map_err(DashboardError::from),
        }
    }
}

fn label_count(counts: &BTreeMap<String, u64>, label: &str) -> u64 {
    counts.get(label).copied().unwrap_or(0)
}
