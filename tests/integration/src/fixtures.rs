//! Test fixtures: a small, fully known portal dataset

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use portal_cache::{CacheConfig, CacheService};
use portal_dashboard::{
    Client, ClientStatus, DashboardConfig, DashboardService, InMemoryAnalyticsStore, Invoice,
    InvoiceStatus, Project, ProjectStatus, Ticket, TicketPriority, TicketStatus,
};
use std::sync::Arc;

/// Client with two projects, one paid and one sent invoice
pub const ACME: u64 = 1;
/// Client with two projects, one paid, one overdue and one draft invoice
pub const GLOBEX: u64 = 2;
/// Inactive client with nothing attached
pub const INITECH: u64 = 3;

fn client(id: u64, name: &str, status: ClientStatus, created_at: DateTime<Utc>) -> Client {
    Client {
        id,
        name: name.to_string(),
        status,
        created_at,
    }
}

fn project(
    id: u64,
    client_id: u64,
    name: &str,
    status: ProjectStatus,
    created_at: DateTime<Utc>,
) -> Project {
    Project {
        id,
        client_id,
        name: name.to_string(),
        status,
        budget: 10_000.0,
        created_at,
    }
}

fn ticket(
    id: u64,
    project_id: u64,
    client_id: u64,
    status: TicketStatus,
    priority: TicketPriority,
    created_at: DateTime<Utc>,
) -> Ticket {
    Ticket {
        id,
        project_id,
        client_id,
        status,
        priority,
        created_at,
    }
}

fn invoice(
    id: u64,
    project_id: u64,
    client_id: u64,
    amount: f64,
    status: InvoiceStatus,
    created_at: DateTime<Utc>,
) -> Invoice {
    Invoice {
        id,
        project_id,
        client_id,
        amount,
        status,
        created_at,
    }
}

/// Seed a store with three clients, four projects, four tickets and five invoices
///
/// Totals across the dataset:
/// - clients: 3 total, 2 active
/// - projects: 2 active, 1 completed, 1 planning
/// - tickets: 2 open (high, urgent), 2 resolved
/// - invoices: 3000 paid over 2 invoices, 750 outstanding
pub fn seeded_store() -> Arc<InMemoryAnalyticsStore> {
    let now = Utc::now();
    let days = ChronoDuration::days;
    let store = InMemoryAnalyticsStore::new();

    store.insert_client(client(ACME, "Acme", ClientStatus::Active, now - days(400)));
    store.insert_client(client(GLOBEX, "Globex", ClientStatus::Active, now - days(300)));
    store.insert_client(client(INITECH, "Initech", ClientStatus::Inactive, now - days(200)));

    store.insert_project(project(1, ACME, "Website Redesign", ProjectStatus::Active, now - days(40)));
    store.insert_project(project(2, ACME, "Mobile App", ProjectStatus::Completed, now - days(90)));
    store.insert_project(project(3, GLOBEX, "Brand Refresh", ProjectStatus::Planning, now - days(5)));
    store.insert_project(project(4, GLOBEX, "Website Audit", ProjectStatus::Active, now - days(20)));

    store.insert_ticket(ticket(1, 1, ACME, TicketStatus::Open, TicketPriority::High, now - days(3)));
    store.insert_ticket(ticket(2, 1, ACME, TicketStatus::Resolved, TicketPriority::Low, now - days(30)));
    store.insert_ticket(ticket(3, 3, GLOBEX, TicketStatus::InProgress, TicketPriority::Urgent, now - days(1)));
    store.insert_ticket(ticket(4, 4, GLOBEX, TicketStatus::Closed, TicketPriority::Medium, now - days(15)));

    store.insert_invoice(invoice(1, 1, ACME, 1_000.0, InvoiceStatus::Paid, now - days(100)));
    store.insert_invoice(invoice(2, 2, ACME, 500.0, InvoiceStatus::Sent, now - days(100)));
    store.insert_invoice(invoice(3, 3, GLOBEX, 2_000.0, InvoiceStatus::Paid, now - days(100)));
    store.insert_invoice(invoice(4, 4, GLOBEX, 250.0, InvoiceStatus::Overdue, now - days(100)));
    store.insert_invoice(invoice(5, 4, GLOBEX, 300.0, InvoiceStatus::Draft, now - days(100)));

    Arc::new(store)
}

/// In-memory cache with default settings
pub fn memory_cache() -> CacheService {
    CacheService::in_memory(&CacheConfig::default())
}

/// Dashboard over the seeded store without a resilience layer
pub fn dashboard(store: Arc<InMemoryAnalyticsStore>) -> DashboardService {
    DashboardService::new(memory_cache(), store, DashboardConfig::default())
}
