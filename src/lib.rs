//! dbserver - a registry of named, self-healing database connections
//!
//! dbserver keeps a set of logical databases (SQLite, MySQL/MariaDB,
//! PostgreSQL) connected:
//! - entries are registered from configuration and connected lazily
//! - a background loop retries the ones that are down
//! - callers query and execute by logical name, without driver types
//! - a thin HTTP shell reports status and runs diagnostics

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod http;
pub mod logging;

// Re-export main types for public API
pub use config::{AppConfig, DatabaseConfig, DbServerConfig};
pub use database::{
    ConnectionRegistry, ConnectionSettings, DatabaseHandle, Driver, DriverRegistry, EntryStatus,
    ExecResult, Record, ReconcileLoop, RowCursor, SqlValue,
};
pub use error::{Error, Result};
