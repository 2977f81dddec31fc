//! Multi-database support
//!
//! Drivers for SQLite, MySQL and PostgreSQL behind one handle trait, the
//! registry that keeps named connections alive, and its status report.

pub mod adapters;
pub mod cursor;
pub mod driver;
pub mod registry;
pub mod status;
pub mod types;

// Re-export main types for convenience
pub use adapters::{MySqlDriver, PostgresDriver, SqliteDriver};
pub use cursor::{RowCursor, RowSink};
pub use driver::{
    sanitize_url, ConnectionSettings, DatabaseHandle, Driver, DriverRegistry, ExecResult,
};
pub use registry::{
    ConnectionRegistry, ConnectionRegistryBuilder, ConnectionState, ManagedConnection,
    ReconcileLoop, DEFAULT_CHECK_INTERVAL, DEFAULT_CONNECT_TIMEOUT,
};
pub use status::{EntryStatus, STATUS_HEADER};
pub use types::{DatabaseBackend, Record, SqlValue, TypeConverter};
