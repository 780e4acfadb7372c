//! Portal records the dashboard aggregates over.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $(
                #[allow(missing_docs)]
                $variant,
            )+
        }

        impl $name {
            /// Stable label used for grouping and filtering
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

status_enum!(
    /// Client account status
    ClientStatus {
        Active => "active",
        Inactive => "inactive",
    }
);

status_enum!(
    /// Project lifecycle status
    ProjectStatus {
        Planning => "planning",
        Active => "active",
        OnHold => "on_hold",
        Completed => "completed",
        Cancelled => "cancelled",
    }
);

status_enum!(
    /// Support ticket status
    TicketStatus {
        Open => "open",
        InProgress => "in_progress",
        Resolved => "resolved",
        Closed => "closed",
    }
);

status_enum!(
    /// Support ticket priority
    TicketPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
);

status_enum!(
    /// Invoice payment status
    InvoiceStatus {
        Draft => "draft",
        Sent => "sent",
        Paid => "paid",
        Overdue => "overdue",
    }
);

/// Client account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Client id; also the user id dashboards are keyed by
    pub id: u64,
    /// Display name
    pub name: String,
    /// Account status
    pub status: ClientStatus,
    /// Signup time
    pub created_at: DateTime<Utc>,
}

/// Client project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project id
    pub id: u64,
    /// Owning client
    pub client_id: u64,
    /// Project name
    pub name: String,
    /// Lifecycle status
    pub status: ProjectStatus,
    /// Agreed budget
    pub budget: f64,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Support ticket raised on a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket id
    pub id: u64,
    /// Project the ticket belongs to
    pub project_id: u64,
    /// Client who raised it
    pub client_id: u64,
    /// Workflow status
    pub status: TicketStatus,
    /// Priority
    pub priority: TicketPriority,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Invoice issued to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice id
    pub id: u64,
    /// Project billed
    pub project_id: u64,
    /// Client billed
    pub client_id: u64,
    /// Invoice total
    pub amount: f64,
    /// Payment status
    pub status: InvoiceStatus,
    /// Issue time
    pub created_at: DateTime<Utc>,
}

/// Filter for the paginated project list
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectFilter {
    /// Only projects owned by this client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u64>,
    /// Only projects in this status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    /// Case-insensitive substring of the project name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ProjectFilter {
    /// Filter matching every project
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one client
    #[must_use]
    pub const fn for_client(mut self, client_id: u64) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Restrict to one status
    #[must_use]
    pub const fn with_status(mut self, status: ProjectStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to names containing `search`
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Deterministic key fragment; filters matching the same projects map to
    /// the same fragment
    #[must_use]
    pub fn cache_key(&self) -> String {
        let client = self.client_id.map_or_else(|| "*".to_string(), |id| id.to_string());
        let status = self.status.map_or("*", ProjectStatus::as_str);
        let search = self
            .search
            .as_deref()
            .map_or_else(|| "*".to_string(), str::to_lowercase);
        format!("client={client}|status={status}|search={search}")
    }

    /// Check whether a project passes the filter
    #[must_use]
    pub fn matches(&self, project: &Project) -> bool {
        self.client_id.map_or(true, |id| project.client_id == id)
            && self.status.map_or(true, |status| project.status == status)
            && self.search.as_deref().map_or(true, |needle| {
                project.name.to_lowercase().contains(&needle.to_lowercase())
            })
    }
}

/// One-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page number, starting at 1
    pub page: u32,
    /// Items per page
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl Pagination {
    /// Create a page request
    #[must_use]
    pub const fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    /// Clamp to page >= 1 and 1 <= per_page <= `max_per_page`
    #[must_use]
    pub fn clamped(self, max_per_page: u32) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, max_per_page.max(1)),
        }
    }

    /// Number of items skipped before this page
    #[must_use]
    pub const fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.per_page as usize
    }
}
