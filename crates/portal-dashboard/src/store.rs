//! Analytics data store abstraction.
//!
//! The dashboard only needs a handful of aggregate primitives; any database
//! that can count, sum, group and page can implement [`AnalyticsStore`].

use crate::error::StoreError;
use crate::model::{
    Client, Invoice, InvoiceStatus, Pagination, Project, ProjectFilter, Ticket,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Record collections the store can aggregate over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    /// Client accounts
    Clients,
    /// Projects
    Projects,
    /// Support tickets
    Tickets,
    /// Invoices
    Invoices,
}

/// Field to group counts by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// Record status
    Status,
    /// Ticket priority; only valid for [`Entity::Tickets`]
    Priority,
}

/// Predicate shared by the aggregate queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Only records belonging to this client
    pub client_id: Option<u64>,
    /// Only records whose status label is one of these; empty means any
    pub statuses: Vec<&'static str>,
    /// Only records created at or after this instant
    pub created_from: Option<DateTime<Utc>>,
    /// Only records created strictly before this instant
    pub created_to: Option<DateTime<Utc>>,
}

impl RecordFilter {
    /// Filter matching everything
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a client when `client_id` is set
    #[must_use]
    pub const fn scoped(mut self, client_id: Option<u64>) -> Self {
        self.client_id = client_id;
        self
    }

    /// Restrict to the given status labels
    #[must_use]
    pub fn with_statuses(mut self, statuses: &[&'static str]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    /// Restrict to records created at or after `from`
    #[must_use]
    pub const fn created_since(mut self, from: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self
    }

    /// Restrict to records created in `[from, to)`
    #[must_use]
    pub const fn created_between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self.created_to = Some(to);
        self
    }

    fn matches(&self, client_id: u64, status: &str, created_at: DateTime<Utc>) -> bool {
        self.client_id.map_or(true, |id| id == client_id)
            && (self.statuses.is_empty() || self.statuses.contains(&status))
            && self.created_from.map_or(true, |from| created_at >= from)
            && self.created_to.map_or(true, |to| created_at < to)
    }
}

/// One page of projects plus the total matching count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPage {
    /// Projects on this page, newest first
    pub items: Vec<Project>,
    /// Projects matching the filter across all pages
    pub total: u64,
}

/// Aggregate queries the dashboard issues against the portal database
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Count records matching `filter`
    async fn count(&self, entity: Entity, filter: &RecordFilter) -> Result<u64, StoreError>;

    /// Sum invoice amounts matching `filter`
    async fn sum_invoice_amounts(&self, filter: &RecordFilter) -> Result<f64, StoreError>;

    /// Count records matching `filter` grouped by a field
    async fn group_count(
        &self,
        entity: Entity,
        group_by: GroupBy,
        filter: &RecordFilter,
    ) -> Result<BTreeMap<String, u64>, StoreError>;

    /// Page through projects, newest first
    async fn list_projects(
        &self,
        filter: &ProjectFilter,
        page: Pagination,
    ) -> Result<ProjectPage, StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    clients: Vec<Client>,
    projects: Vec<Project>,
    tickets: Vec<Ticket>,
    invoices: Vec<Invoice>,
}

/// In-process [`AnalyticsStore`] for tests and demos
///
/// Counts every query it serves so callers can observe whether an
/// aggregation actually ran. Can be switched into a failing mode to
/// simulate an unreachable database.
#[derive(Debug, Default)]
pub struct InMemoryAnalyticsStore {
    tables: RwLock<Tables>,
    queries: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryAnalyticsStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a client
    pub fn insert_client(&self, client: Client) {
        self.tables.write().clients.push(client);
    }

    /// Insert a project
    pub fn insert_project(&self, project: Project) {
        self.tables.write().projects.push(project);
    }

    /// Insert a ticket
    pub fn insert_ticket(&self, ticket: Ticket) {
        self.tables.write().tickets.push(ticket);
    }

    /// Insert an invoice
    pub fn insert_invoice(&self, invoice: Invoice) {
        self.tables.write().invoices.push(invoice);
    }

    /// Mark an invoice paid; returns false when it doesn't exist
    pub fn mark_invoice_paid(&self, invoice_id: u64) -> bool {
        let mut tables = self.tables.write();
        match tables.invoices.iter_mut().find(|i| i.id == invoice_id) {
            Some(invoice) => {
                invoice.status = InvoiceStatus::Paid;
                true
            }
            None => false,
        }
    }

    /// Number of queries served so far
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    /// Make every subsequent query fail with [`StoreError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn begin_query(&self) -> Result<(), StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(())
    }
}

fn tally(counts: &mut BTreeMap<String, u64>, label: &str) {
    *counts.entry(label.to_string()).or_insert(0) += 1;
}

#[async_trait]
impl AnalyticsStore for InMemoryAnalyticsStore {
    async fn count(&self, entity: Entity, filter: &RecordFilter) -> Result<u64, StoreError> {
        self.begin_query()?;
        let tables = self.tables.read();

        let count = match entity {
            Entity::Clients => tables
                .clients
                .iter()
                .filter(|c| filter.matches(c.id, c.status.as_str(), c.created_at))
                .count(),
            Entity::Projects => tables
                .projects
                .iter()
                .filter(|p| filter.matches(p.client_id, p.status.as_str(), p.created_at))
                .count(),
            Entity::Tickets => tables
                .tickets
                .iter()
                .filter(|t| filter.matches(t.client_id, t.status.as_str(), t.created_at))
                .count(),
            Entity::Invoices => tables
                .invoices
                .iter()
                .filter(|i| filter.matches(i.client_id, i.status.as_str(), i.created_at))
                .count(),
        };
        Ok(count as u64)
    }

    async fn sum_invoice_amounts(&self, filter: &RecordFilter) -> Result<f64, StoreError> {
        self.begin_query()?;
        let tables = self.tables.read();

        Ok(tables
            .invoices
            .iter()
            .filter(|i| filter.matches(i.client_id, i.status.as_str(), i.created_at))
            .map(|i| i.amount)
            .sum())
    }

    async fn group_count(
        &self,
        entity: Entity,
        group_by: GroupBy,
        filter: &RecordFilter,
    ) -> Result<BTreeMap<String, u64>, StoreError> {
        self.begin_query()?;
        let tables = self.tables.read();
        let mut counts = BTreeMap::new();

        match (entity, group_by) {
            (Entity::Clients, GroupBy::Status) => {
                for c in &tables.clients {
                    if filter.matches(c.id, c.status.as_str(), c.created_at) {
                        tally(&mut counts, c.status.as_str());
                    }
                }
            }
            (Entity::Projects, GroupBy::Status) => {
                for p in &tables.projects {
                    if filter.matches(p.client_id, p.status.as_str(), p.created_at) {
                        tally(&mut counts, p.status.as_str());
                    }
                }
            }
            (Entity::Tickets, GroupBy::Status) => {
                for t in &tables.tickets {
                    if filter.matches(t.client_id, t.status.as_str(), t.created_at) {
                        tally(&mut counts, t.status.as_str());
                    }
                }
            }
            (Entity::Tickets, GroupBy::Priority) => {
                for t in &tables.tickets {
                    if filter.matches(t.client_id, t.status.as_str(), t.created_at) {
                        tally(&mut counts, t.priority.as_str());
                    }
                }
            }
            (Entity::Invoices, GroupBy::Status) => {
                for i in &tables.invoices {
                    if filter.matches(i.client_id, i.status.as_str(), i.created_at) {
                        tally(&mut counts, i.status.as_str());
                    }
                }
            }
            (entity, GroupBy::Priority) => {
                return Err(StoreError::InvalidQuery(format!(
                    "{entity:?} cannot be grouped by priority"
                )));
            }
        }
        Ok(counts)
    }

    async fn list_projects(
        &self,
        filter: &ProjectFilter,
        page: Pagination,
    ) -> Result<ProjectPage, StoreError> {
        self.begin_query()?;
        let tables = self.tables.read();

        let mut matching: Vec<&Project> =
            tables.projects.iter().filter(|p| filter.matches(p)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset())
            .take(page.per_page as usize)
            .cloned()
            .collect();

        Ok(ProjectPage { items, total })
    }
}
