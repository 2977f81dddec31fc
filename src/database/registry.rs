//! Connection registry for multiple named databases
//!
//! The registry maps logical database names to managed connections. Entries
//! start disconnected; [`ConnectionRegistry::reconcile`] opens and probes
//! them, and a background [`ReconcileLoop`] keeps retrying the ones that are
//! still down. Callers only ever see a live handle or a typed error.

use crate::config::DbServerConfig;
use crate::database::cursor::RowCursor;
use crate::database::driver::{
    ConnectionSettings, DatabaseHandle, Driver, DriverRegistry, ExecResult,
};
use crate::database::types::{Record, SqlValue};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default bound on one open + ping attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default period of the background reconcile loop
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Health of one managed connection
#[derive(Clone)]
pub enum ConnectionState {
    Disconnected,
    Connected(Arc<dyn DatabaseHandle>),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }

    pub fn handle(&self) -> Option<Arc<dyn DatabaseHandle>> {
        match self {
            ConnectionState::Connected(handle) => Some(Arc::clone(handle)),
            ConnectionState::Disconnected => None,
        }
    }
}

/// One registry entry
pub struct ManagedConnection {
    name: String,
    settings: ConnectionSettings,
    state: RwLock<ConnectionState>,
    /// Serializes connection attempts on this entry
    repair: Mutex<()>,
}

impl ManagedConnection {
    fn new(name: String, settings: ConnectionSettings) -> Self {
        Self {
            name,
            settings,
            state: RwLock::new(ConnectionState::Disconnected),
            repair: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.is_connected()
    }

    /// The live handle, if connected
    pub async fn handle(&self) -> Option<Arc<dyn DatabaseHandle>> {
        self.state.read().await.handle()
    }

    /// Flip back to disconnected, returning the handle that was dropped
    async fn disconnect(&self) -> Option<Arc<dyn DatabaseHandle>> {
        let mut state = self.state.write().await;
        std::mem::replace(&mut *state, ConnectionState::Disconnected).handle()
    }
}

/// Registry of named, self-healing database connections
///
/// Cloning is cheap; all clones share the same entries.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    entries: RwLock<HashMap<String, Arc<ManagedConnection>>>,
    drivers: DriverRegistry,
    connect_timeout: Duration,
    log_statement_timing: bool,
}

impl ConnectionRegistry {
    /// An empty registry with the built-in drivers
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ConnectionRegistryBuilder {
        ConnectionRegistryBuilder::new()
    }

    /// An empty registry tuned by the `[dbserver]` section
    pub fn from_config(config: &DbServerConfig) -> Self {
        Self::builder()
            .connect_timeout(config.connect_timeout())
            .log_statement_timing(config.log_statement_timing)
            .build()
    }

    /// Add or refresh an entry
    ///
    /// A connected entry is left untouched. Otherwise the entry is (re)written
    /// disconnected with the given settings; the next reconcile connects it.
    pub async fn register(&self, name: impl Into<String>, settings: ConnectionSettings) {
        let name = name.into();
        let mut entries = self.inner.entries.write().await;

        if let Some(existing) = entries.get(&name) {
            if existing.is_connected().await {
                log::debug!("db({}) already connected, keeping current pool", name);
                return;
            }
        }

        log::debug!(
            "Registered db({}) driver={} url={} max_idle={} max_open={}",
            name,
            settings.driver,
            settings.sanitized_url(),
            settings.max_idle,
            settings.max_open
        );
        entries.insert(
            name.clone(),
            Arc::new(ManagedConnection::new(name, settings)),
        );
    }

    /// Remove an entry and close its pool
    ///
    /// Returns whether the entry existed.
    pub async fn deregister(&self, name: &str) -> bool {
        let removed = self.inner.entries.write().await.remove(name);

        match removed {
            Some(entry) => {
                if let Some(handle) = entry.disconnect().await {
                    handle.close().await;
                }
                log::info!("Deregistered db({})", name);
                true
            }
            None => false,
        }
    }

    /// Remove every entry, closing all pools
    pub async fn shutdown(&self) {
        for name in self.names().await {
            self.deregister(&name).await;
        }
    }

    /// Register every database of the `[dbserver]` section
    pub async fn apply_config(&self, config: &DbServerConfig) {
        for db in &config.databases {
            self.register(db.name.clone(), db.settings()).await;
        }
    }

    /// Bring the registry up from configuration
    ///
    /// Does nothing when the section is disabled. Otherwise registers the
    /// configured databases, runs one reconcile pass and, if the check
    /// interval is positive, starts the background loop.
    pub async fn start(&self, config: &DbServerConfig) -> Option<ReconcileLoop> {
        if !config.enabled {
            log::info!("dbserver disabled, no databases registered");
            return None;
        }

        self.apply_config(config).await;
        self.reconcile().await;

        config
            .check_interval()
            .map(|interval| self.start_reconcile_loop(interval))
    }

    /// Try to connect every disconnected entry
    ///
    /// Entries are attempted concurrently and independently. Failures are
    /// logged and leave the entry disconnected; nothing is returned.
    pub async fn reconcile(&self) {
        let entries = self.entries().await;
        let attempts = entries.into_iter().map(|entry| self.repair(entry));
        futures::future::join_all(attempts).await;
    }

    async fn repair(&self, entry: Arc<ManagedConnection>) {
        if entry.is_connected().await {
            return;
        }

        let _attempt = entry.repair.lock().await;

        // Another reconcile may have repaired it while we waited
        if entry.is_connected().await {
            return;
        }

        let settings = entry.settings();
        let timeout = self.inner.connect_timeout;
        let outcome = match tokio::time::timeout(timeout, self.connect(settings)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!(
                "connect attempt exceeded {:?}",
                timeout
            ))),
        };

        match outcome {
            Ok(handle) => {
                if self.install(&entry, Arc::clone(&handle)).await {
                    log::info!("connect db ok: {}", entry.name);
                } else {
                    log::debug!(
                        "db({}) was replaced or removed during connect, discarding pool",
                        entry.name
                    );
                    handle.close().await;
                }
            }
            Err(e) => {
                log::error!(
                    "connect db({}) driver={} url={} error: {}",
                    entry.name,
                    settings.driver,
                    settings.sanitized_url(),
                    e
                );
            }
        }
    }

    /// Open a pool and prove it with a ping
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Arc<dyn DatabaseHandle>> {
        let driver: Arc<dyn Driver> = self.inner.drivers.resolve(&settings.driver)?;
        let handle = driver.open(settings).await?;

        if let Err(e) = handle.ping().await {
            handle.close().await;
            return Err(e);
        }

        Ok(handle)
    }

    /// Install a handle, but only into the entry currently mapped to its name
    ///
    /// The map read lock is held across the check and the write so that a
    /// concurrent register or deregister cannot slip in between.
    async fn install(
        &self,
        entry: &Arc<ManagedConnection>,
        handle: Arc<dyn DatabaseHandle>,
    ) -> bool {
        let entries = self.inner.entries.read().await;
        let current = entries
            .get(&entry.name)
            .map_or(false, |mapped| Arc::ptr_eq(mapped, entry));

        if current {
            *entry.state.write().await = ConnectionState::Connected(handle);
        }
        current
    }

    /// Run [`reconcile`](Self::reconcile) every `interval` on a background task
    pub fn start_reconcile_loop(&self, interval: Duration) -> ReconcileLoop {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let registry = self.clone();

        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            log::debug!("Reconcile loop started, interval {:?}", interval);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = registry.reconcile() => {}
                            _ = &mut shutdown_rx => break,
                        }
                    }
                }
            }
            log::debug!("Reconcile loop stopped");
        });

        ReconcileLoop {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    async fn entry(&self, name: &str) -> Result<Arc<ManagedConnection>> {
        self.inner
            .entries
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(name))
    }

    /// Snapshot of all entries
    pub(crate) async fn entries(&self) -> Vec<Arc<ManagedConnection>> {
        self.inner.entries.read().await.values().cloned().collect()
    }

    /// The live handle for `name`
    ///
    /// # Returns
    /// * `Err(Error::NotFound)` - If no entry has this name
    /// * `Err(Error::NotConnected)` - If the entry has no live handle
    pub async fn handle(&self, name: &str) -> Result<Arc<dyn DatabaseHandle>> {
        let entry = self.entry(name).await?;
        entry
            .handle()
            .await
            .ok_or_else(|| Error::not_connected(name))
    }

    /// Run a read statement and return a cursor over its rows
    ///
    /// The caller owns the cursor; dropping it releases the connection.
    pub async fn query(&self, name: &str, sql: &str) -> Result<RowCursor> {
        let handle = self.handle(name).await?;
        let started = Instant::now();
        let result = handle.query(sql).await;
        self.log_timing(name, "query", sql, started);
        result
    }

    /// Run a read statement and collect every row
    ///
    /// SQL NULL is kept as `SqlValue::Null`. The result is not bounded.
    pub async fn query_buffered(&self, name: &str, sql: &str) -> Result<Vec<Record>> {
        let started = Instant::now();
        let cursor = self.query(name, sql).await?;
        let records = cursor.collect_all().await;
        self.log_timing(name, "query_buffered", sql, started);
        records
    }

    /// Execute a data-modifying statement with positional arguments
    ///
    /// On the built-in engines the argument count must match the statement's
    /// placeholders, otherwise a statement error is returned unexecuted.
    pub async fn exec(&self, name: &str, sql: &str, args: Vec<SqlValue>) -> Result<ExecResult> {
        let handle = self.handle(name).await?;
        if let Some(backend) = handle.backend() {
            let expected = backend.placeholder_count(sql);
            if expected != args.len() {
                return Err(Error::statement(format!(
                    "db({}) exec error: statement expects {} arguments, got {}",
                    name,
                    expected,
                    args.len()
                )));
            }
        }
        let started = Instant::now();
        let result = handle.execute(sql, args).await;
        self.log_timing(name, "exec", sql, started);
        result
    }

    fn log_timing(&self, name: &str, op: &str, sql: &str, started: Instant) {
        if self.inner.log_statement_timing {
            log::info!(
                "db({}) {} took {:.3}ms: {}",
                name,
                op,
                started.elapsed().as_secs_f64() * 1000.0,
                sql
            );
        }
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.inner.entries.read().await.contains_key(name)
    }

    /// Whether `name` exists and has a live handle
    pub async fn is_connected(&self, name: &str) -> bool {
        match self.entry(name).await {
            Ok(entry) => entry.is_connected().await,
            Err(_) => false,
        }
    }

    /// Registered names, sorted
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.entries.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.entries.read().await.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for ConnectionRegistry
pub struct ConnectionRegistryBuilder {
    drivers: DriverRegistry,
    connect_timeout: Duration,
    log_statement_timing: bool,
}

impl ConnectionRegistryBuilder {
    pub fn new() -> Self {
        Self {
            drivers: DriverRegistry::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            log_statement_timing: false,
        }
    }

    /// Replace the driver set
    pub fn drivers(mut self, drivers: DriverRegistry) -> Self {
        self.drivers = drivers;
        self
    }

    /// Add (or override) one driver
    pub fn driver<D>(mut self, id: impl Into<String>, driver: D) -> Self
    where
        D: Driver + 'static,
    {
        self.drivers.register(id, driver);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn log_statement_timing(mut self, enabled: bool) -> Self {
        self.log_statement_timing = enabled;
        self
    }

    pub fn build(self) -> ConnectionRegistry {
        ConnectionRegistry {
            inner: Arc::new(RegistryInner {
                entries: RwLock::new(HashMap::new()),
                drivers: self.drivers,
                connect_timeout: self.connect_timeout,
                log_statement_timing: self.log_statement_timing,
            }),
        }
    }
}

impl Default for ConnectionRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the background reconcile task
///
/// Dropping it signals the loop to stop without waiting.
pub struct ReconcileLoop {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ReconcileLoop {
    /// Signal the loop and wait for it to finish
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::error!("Reconcile loop task failed: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }
}

impl Drop for ReconcileLoop {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_settings() -> ConnectionSettings {
        ConnectionSettings::new("sqlite", ":memory:", 1, 1)
    }

    #[tokio::test]
    async fn test_register_starts_disconnected() {
        let registry = ConnectionRegistry::new();
        registry.register("db1", memory_settings()).await;

        assert!(registry.contains("db1").await);
        assert!(!registry.is_connected("db1").await);
        assert!(matches!(
            registry.handle("db1").await,
            Err(Error::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_name_is_not_found() {
        let registry = ConnectionRegistry::new();
        assert!(matches!(
            registry.query("nope", "select 1").await,
            Err(Error::NotFound(_))
        ));
        assert!(!registry.deregister("nope").await);
    }

    #[tokio::test]
    async fn test_reregister_disconnected_overwrites_settings() {
        let registry = ConnectionRegistry::new();
        registry
            .register("db1", ConnectionSettings::new("driverX", "bad", 1, 1))
            .await;
        registry.register("db1", memory_settings()).await;

        let entry = registry.entry("db1").await.unwrap();
        assert_eq!(entry.settings().driver, "sqlite");
    }

    #[tokio::test]
    async fn test_install_skips_replaced_entry() {
        let registry = ConnectionRegistry::new();
        registry.register("db1", memory_settings()).await;
        let stale = registry.entry("db1").await.unwrap();

        registry.register("db1", memory_settings()).await;
        let handle = registry.connect(stale.settings()).await.unwrap();

        assert!(!registry.install(&stale, handle).await);
        assert!(!registry.is_connected("db1").await);
    }

    #[tokio::test]
    async fn test_reconcile_loop_stops() {
        let registry = ConnectionRegistry::new();
        let reconcile_loop = registry.start_reconcile_loop(Duration::from_millis(10));
        assert!(reconcile_loop.is_running());

        tokio::time::timeout(Duration::from_secs(5), reconcile_loop.stop())
            .await
            .unwrap();
    }
}
