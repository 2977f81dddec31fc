//! Fake drivers for exercising the registry without a database server

#![allow(dead_code)]

use async_trait::async_trait;
use dbserver::database::{ConnectionSettings, DatabaseHandle, Driver, ExecResult, RowCursor};
use dbserver::{Error, Result, SqlValue};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How a [`FakeDriver`] behaves when asked to open a handle
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Open and ping succeed; the pool reports this many open connections
    Healthy { open_connections: u32 },
    /// `open` fails
    FailOpen,
    /// `open` succeeds, `ping` fails
    FailPing,
    /// `open` sleeps this long, then succeeds
    SlowOpen(Duration),
    /// The first `n` opens fail, later ones succeed
    FailTimes(usize),
}

#[derive(Clone)]
pub struct FakeDriver {
    behavior: Behavior,
    opens: Arc<AtomicUsize>,
    last_handle_closed: Arc<AtomicBool>,
}

impl FakeDriver {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            opens: Arc::new(AtomicUsize::new(0)),
            last_handle_closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn healthy(open_connections: u32) -> Self {
        Self::new(Behavior::Healthy { open_connections })
    }

    /// Number of `open` calls so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Whether the most recently opened handle has been closed
    pub fn last_handle_closed(&self) -> bool {
        self.last_handle_closed.load(Ordering::SeqCst)
    }

    fn handle(&self, fail_ping: bool, open_connections: u32) -> Arc<dyn DatabaseHandle> {
        let closed = Arc::new(AtomicBool::new(false));
        self.last_handle_closed.store(false, Ordering::SeqCst);
        Arc::new(FakeHandle {
            fail_ping,
            open_connections,
            closed,
            closed_flag: Arc::clone(&self.last_handle_closed),
        })
    }
}

#[async_trait]
impl Driver for FakeDriver {
    fn name(&self) -> &str {
        "fake"
    }

    async fn open(&self, _settings: &ConnectionSettings) -> Result<Arc<dyn DatabaseHandle>> {
        let attempt = self.opens.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            Behavior::Healthy { open_connections } => Ok(self.handle(false, *open_connections)),
            Behavior::FailOpen => Err(Error::database_connection("fake: connection refused")),
            Behavior::FailPing => Ok(self.handle(true, 0)),
            Behavior::SlowOpen(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(self.handle(false, 1))
            }
            Behavior::FailTimes(n) => {
                if attempt < *n {
                    Err(Error::database_connection("fake: not yet"))
                } else {
                    Ok(self.handle(false, 1))
                }
            }
        }
    }
}

pub struct FakeHandle {
    fail_ping: bool,
    open_connections: u32,
    closed: Arc<AtomicBool>,
    closed_flag: Arc<AtomicBool>,
}

#[async_trait]
impl DatabaseHandle for FakeHandle {
    fn driver(&self) -> &str {
        "fake"
    }

    async fn ping(&self) -> Result<()> {
        if self.fail_ping {
            Err(Error::database_connection("fake: ping timed out"))
        } else {
            Ok(())
        }
    }

    async fn query(&self, _sql: &str) -> Result<RowCursor> {
        Ok(RowCursor::empty())
    }

    async fn execute(&self, _sql: &str, _args: Vec<SqlValue>) -> Result<ExecResult> {
        Ok(ExecResult {
            last_insert_id: Some(1),
            rows_affected: 1,
        })
    }

    fn open_connections(&self) -> u32 {
        if self.closed.load(Ordering::SeqCst) {
            0
        } else {
            self.open_connections
        }
    }

    fn idle_connections(&self) -> u32 {
        0
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.closed_flag.store(true, Ordering::SeqCst);
    }
}

pub fn settings(driver: &str) -> ConnectionSettings {
    ConnectionSettings::new(driver, "fake://localhost/db", 1, 1)
}

pub fn memory_settings(max_idle: u32, max_open: u32) -> ConnectionSettings {
    ConnectionSettings::new("sqlite", ":memory:", max_idle, max_open)
}
