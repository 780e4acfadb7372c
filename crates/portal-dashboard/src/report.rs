//! Aggregates returned by the dashboard queries.
//!
//! All of these are cached as JSON, so they round-trip through serde.

use crate::model::Project;
use chrono::{DateTime, Utc};
use portal_cache::{CacheHealth, CacheStats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Client account figures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientStats {
    /// All clients
    pub total: u64,
    /// Active clients
    pub active: u64,
    /// Clients who signed up this calendar month
    pub new_this_month: u64,
    /// Month-over-month signup growth in percent
    pub growth_pct: f64,
}

/// Project figures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectStats {
    /// All projects
    pub total: u64,
    /// Projects in progress
    pub active: u64,
    /// Finished projects
    pub completed: u64,
    /// Completed share of all projects in percent
    pub completion_rate: f64,
    /// Project count per status label
    pub by_status: BTreeMap<String, u64>,
}

/// Support ticket figures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketStats {
    /// All tickets
    pub total: u64,
    /// Tickets still being worked on
    pub open: u64,
    /// Resolved or closed tickets
    pub resolved: u64,
    /// Resolved share of all tickets in percent
    pub resolution_rate: f64,
    /// Open ticket count per priority label
    pub open_by_priority: BTreeMap<String, u64>,
}

/// Invoice figures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueStats {
    /// Sum of paid invoices
    pub total_paid: f64,
    /// Sum of sent and overdue invoices
    pub outstanding: f64,
    /// Paid invoices issued this month
    pub this_month: f64,
    /// Paid invoices issued last month
    pub last_month: f64,
    /// Month-over-month revenue growth in percent
    pub growth_pct: f64,
    /// Mean paid invoice amount
    pub average_invoice: f64,
    /// Paid share of everything billed in percent
    pub collection_rate: f64,
}

/// Portal-wide statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    /// Client figures
    pub clients: ClientStats,
    /// Project figures
    pub projects: ProjectStats,
    /// Ticket figures
    pub tickets: TicketStats,
    /// Revenue figures
    pub revenue: RevenueStats,
    /// When the aggregation ran
    pub generated_at: DateTime<Utc>,
}

/// One client's dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDashboard {
    /// Client the dashboard belongs to
    pub user_id: u64,
    /// The client's projects
    pub projects: ProjectStats,
    /// The client's tickets
    pub tickets: TicketStats,
    /// The client's invoices
    pub revenue: RevenueStats,
    /// Most recently created projects
    pub recent_projects: Vec<Project>,
    /// When the aggregation ran
    pub generated_at: DateTime<Utc>,
}

/// One page of the filtered project list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectListPage {
    /// Projects on this page
    pub items: Vec<Project>,
    /// Projects matching the filter
    pub total: u64,
    /// Page number, starting at 1
    pub page: u32,
    /// Requested page size
    pub per_page: u32,
    /// Number of pages, 0 when nothing matches
    pub total_pages: u64,
}

/// Cache diagnostics for operators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheMetrics {
    /// Cache counters
    pub stats: CacheStats,
    /// Backend round trip
    pub health: CacheHealth,
    /// Suggested tuning actions
    pub recommendations: Vec<String>,
}
