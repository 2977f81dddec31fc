//! Driver abstraction for multi-database support
//!
//! A [`Driver`] turns recorded connection settings into a live
//! [`DatabaseHandle`]. The registry never talks to an engine directly; it only
//! sees these two traits, selected at runtime by driver identifier.

use crate::database::adapters::{MySqlDriver, PostgresDriver, SqliteDriver};
use crate::database::cursor::RowCursor;
use crate::database::types::{DatabaseBackend, SqlValue};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Pool size used when `max_open` is configured as 0
pub const DEFAULT_MAX_OPEN: u32 = 10;

/// Everything needed to (re)open one logical database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Driver identifier, e.g. `sqlite`, `mysql`, `postgres`
    pub driver: String,
    /// Driver-specific connection string
    pub url: String,
    /// Idle connections the pool is expected to hold; reported in status
    pub max_idle: u32,
    /// Upper bound on open connections
    pub max_open: u32,
}

impl ConnectionSettings {
    pub fn new(
        driver: impl Into<String>,
        url: impl Into<String>,
        max_idle: u32,
        max_open: u32,
    ) -> Self {
        Self {
            driver: driver.into(),
            url: url.into(),
            max_idle,
            max_open,
        }
    }

    /// Effective pool ceiling
    pub fn effective_max_open(&self) -> u32 {
        if self.max_open == 0 {
            DEFAULT_MAX_OPEN
        } else {
            self.max_open
        }
    }

    /// Connection string with any password masked, safe for logs
    pub fn sanitized_url(&self) -> String {
        sanitize_url(&self.url)
    }
}

/// Result of a data-modifying statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecResult {
    /// Last generated row id; `None` where the engine has no such concept
    pub last_insert_id: Option<i64>,
    /// Number of rows affected by the statement
    pub rows_affected: u64,
}

/// Factory that opens handles for one database engine
#[async_trait]
pub trait Driver: Send + Sync {
    /// Driver identifier this implementation was registered for
    fn name(&self) -> &str;

    /// Build a pool for `settings`
    ///
    /// Opening may be lazy; the registry always follows it with
    /// [`DatabaseHandle::ping`] before trusting the handle.
    async fn open(&self, settings: &ConnectionSettings) -> Result<Arc<dyn DatabaseHandle>>;
}

/// A live, driver-specific connection pool
#[async_trait]
pub trait DatabaseHandle: Send + Sync {
    /// Identifier of the driver that opened this handle
    fn driver(&self) -> &str;

    /// Engine family, if this handle is backed by one of the built-in engines
    fn backend(&self) -> Option<DatabaseBackend> {
        None
    }

    /// Liveness probe: one round-trip to the server
    async fn ping(&self) -> Result<()>;

    /// Run a read statement and stream its rows
    ///
    /// Returns once the first row (or the end of the result) is available,
    /// so statement errors surface here rather than on the cursor.
    async fn query(&self, sql: &str) -> Result<RowCursor>;

    /// Prepare `sql` as an unpersisted statement, bind `args` and execute it
    async fn execute(&self, sql: &str, args: Vec<SqlValue>) -> Result<ExecResult>;

    /// Connections currently open in the pool (in use + idle)
    fn open_connections(&self) -> u32;

    /// Connections currently idle in the pool
    fn idle_connections(&self) -> u32;

    /// Close the pool, waiting for checked-out connections to return
    async fn close(&self);
}

impl fmt::Debug for dyn DatabaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("driver", &self.driver())
            .field("open_connections", &self.open_connections())
            .finish()
    }
}

/// Maps driver identifiers to implementations
#[derive(Clone)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// An empty registry, with no drivers at all
    pub fn empty() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Registry with the built-in engines and their aliases
    pub fn new() -> Self {
        let mut registry = Self::empty();

        let sqlite: Arc<dyn Driver> = Arc::new(SqliteDriver::new());
        let mysql: Arc<dyn Driver> = Arc::new(MySqlDriver::new());
        let postgres: Arc<dyn Driver> = Arc::new(PostgresDriver::new());

        registry.register_arc("sqlite", sqlite.clone());
        registry.register_arc("sqlite3", sqlite);
        registry.register_arc("mysql", mysql.clone());
        registry.register_arc("mariadb", mysql);
        registry.register_arc("postgres", postgres.clone());
        registry.register_arc("postgresql", postgres);

        registry
    }

    /// Register (or replace) a driver under `id`
    pub fn register<D>(&mut self, id: impl Into<String>, driver: D)
    where
        D: Driver + 'static,
    {
        self.register_arc(id, Arc::new(driver));
    }

    pub fn register_arc(&mut self, id: impl Into<String>, driver: Arc<dyn Driver>) {
        self.drivers.insert(id.into().to_lowercase(), driver);
    }

    /// Look up a driver; identifiers are case-insensitive
    pub fn get(&self, id: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(&id.to_lowercase()).cloned()
    }

    /// Look up a driver or fail with `UnsupportedDriver`
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Driver>> {
        self.get(id).ok_or_else(|| Error::unsupported_driver(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.drivers.contains_key(&id.to_lowercase())
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Mask the password in a connection string for logging
///
/// URL-style strings are rewritten with the `url` crate. DSNs of the form
/// `user:pass@tcp(host)/db` have everything before the last `@` masked.
pub fn sanitize_url(url: &str) -> String {
    if let Some(parsed) = url::Url::parse(url).ok().filter(|u| u.has_host()) {
        if parsed.password().is_some() {
            let mut sanitized = parsed.clone();
            let _ = sanitized.set_password(Some("***"));
            return sanitized.to_string();
        }
        return url.to_string();
    }

    match url.rfind('@') {
        Some(pos) => format!("***{}", &url[pos..]),
        None => url.to_string(),
    }
}
