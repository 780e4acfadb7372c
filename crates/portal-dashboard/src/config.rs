//! Dashboard query configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-query cache lifetimes and paging limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// TTL of the portal-wide statistics
    #[serde(with = "humantime_serde")]
    pub global_stats_ttl: Duration,
    /// TTL of a single user's dashboard
    #[serde(with = "humantime_serde")]
    pub user_dashboard_ttl: Duration,
    /// TTL of a project list page
    #[serde(with = "humantime_serde")]
    pub project_list_ttl: Duration,
    /// Projects shown in a user's "recent projects" panel
    pub recent_projects_limit: u32,
    /// Upper bound on `per_page` for project lists
    pub max_page_size: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            global_stats_ttl: Duration::from_secs(300),
            user_dashboard_ttl: Duration::from_secs(120),
            project_list_ttl: Duration::from_secs(600),
            recent_projects_limit: 5,
            max_page_size: 100,
        }
    }
}
