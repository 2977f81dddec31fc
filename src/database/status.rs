//! Point-in-time status of every registry entry

use crate::database::registry::ConnectionRegistry;
use serde::Serialize;
use std::fmt::Write;

/// Header line of the tab-separated status table
pub const STATUS_HEADER: &str =
    "DBName\tDriver\tMaxIdleConns\tMaxOpenConns\tConnected\tOpenConnections\n";

/// Status of one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStatus {
    pub name: String,
    pub driver: String,
    pub max_idle: u32,
    pub max_open: u32,
    pub connected: bool,
    /// Connections open in the pool right now, 0 without a handle
    pub open_connections: u32,
    pub idle_connections: u32,
}

impl ConnectionRegistry {
    /// Status of every entry, sorted by name
    pub async fn snapshot(&self) -> Vec<EntryStatus> {
        let mut statuses = Vec::new();

        for entry in self.entries().await {
            let settings = entry.settings();
            let handle = entry.handle().await;

            statuses.push(EntryStatus {
                name: entry.name().to_string(),
                driver: settings.driver.clone(),
                max_idle: settings.max_idle,
                max_open: settings.max_open,
                connected: handle.is_some(),
                open_connections: handle.as_ref().map_or(0, |h| h.open_connections()),
                idle_connections: handle.as_ref().map_or(0, |h| h.idle_connections()),
            });
        }

        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Status table as served by `GET /serverinfo`
    pub async fn render_status(&self) -> String {
        render(&self.snapshot().await)
    }
}

/// Render statuses as a tab-separated table with a header line
pub fn render(statuses: &[EntryStatus]) -> String {
    let mut out = String::from(STATUS_HEADER);
    for status in statuses {
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            status.name,
            status.driver,
            status.max_idle,
            status.max_open,
            if status.connected { 1 } else { 0 },
            status.open_connections
        );
    }
    out
}
