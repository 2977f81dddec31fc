//! Driver implementations for the built-in database engines

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::{MySqlDriver, MySqlHandle};
pub use postgres::{PostgresDriver, PostgresHandle};
pub use sqlite::{SqliteDriver, SqliteHandle};

use crate::database::driver::ConnectionSettings;
use crate::error::Error;
use sqlx::pool::PoolOptions;
use sqlx::Database;
use std::time::Duration;

/// How long an unused connection may stay in the pool
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Pool options shared by every engine
///
/// `max_open` caps the pool. Connections are opened on demand only and
/// closed after [`IDLE_TIMEOUT`] without use, so the open count tracks load.
pub(crate) fn pool_options<DB: Database>(settings: &ConnectionSettings) -> PoolOptions<DB> {
    PoolOptions::<DB>::new()
        .max_connections(settings.effective_max_open())
        .min_connections(0)
        .idle_timeout(Some(IDLE_TIMEOUT))
}

/// Wrap a driver error raised while opening or probing a pool
pub(crate) fn connection_error(engine: &str, e: sqlx::Error) -> Error {
    Error::database_connection(format!("{}: {}", engine, e))
}

/// Wrap a driver error raised by a statement, passing the message through
pub(crate) fn statement_error(e: sqlx::Error) -> Error {
    match e {
        sqlx::Error::Database(db) => Error::statement(db.message().to_string()),
        other => Error::statement(other.to_string()),
    }
}
