//! PostgreSQL driver implementation

use super::{connection_error, pool_options, statement_error};
use crate::database::cursor::RowCursor;
use crate::database::driver::{ConnectionSettings, DatabaseHandle, Driver, ExecResult};
use crate::database::types::{DatabaseBackend, PostgresTypeConverter, SqlValue, TypeConverter};
use crate::error::Result;
use async_trait::async_trait;
use futures::StreamExt;
use sqlx::postgres::{PgConnectOptions, PgPool};
use sqlx::Connection;
use std::str::FromStr;
use std::sync::Arc;

/// Opens PostgreSQL pools from a `postgres://` URL
#[derive(Debug, Clone, Default)]
pub struct PostgresDriver;

impl PostgresDriver {
    pub fn new() -> Self {
        PostgresDriver
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn open(&self, settings: &ConnectionSettings) -> Result<Arc<dyn DatabaseHandle>> {
        let options = PgConnectOptions::from_str(&settings.url)
            .map_err(|e| connection_error("postgres", e))?;

        let pool = pool_options(settings).connect_lazy_with(options);
        Ok(Arc::new(PostgresHandle::from_pool(pool)))
    }
}

/// A live PostgreSQL pool
///
/// Statements use `$1, $2, ...` placeholders. PostgreSQL has no generic
/// last-insert id, so [`ExecResult::last_insert_id`] is always `None`; use
/// `RETURNING` with a query instead.
#[derive(Clone)]
pub struct PostgresHandle {
    pool: PgPool,
    converter: PostgresTypeConverter,
}

impl PostgresHandle {
    /// Create handle from existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            converter: PostgresTypeConverter::new(),
        }
    }
}

#[async_trait]
impl DatabaseHandle for PostgresHandle {
    fn driver(&self) -> &str {
        "postgres"
    }

    fn backend(&self) -> Option<DatabaseBackend> {
        Some(self.converter.backend())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| connection_error("postgres", e))?;
        conn.ping()
            .await
            .map_err(|e| connection_error("postgres", e))
    }

    async fn query(&self, sql: &str) -> Result<RowCursor> {
        log::debug!("PostgreSQL QUERY: {}", sql);

        let (sink, cursor) = RowCursor::channel();
        let pool = self.pool.clone();
        let converter = self.converter.clone();
        let sql = sql.to_string();

        tokio::spawn(async move {
            let rows = sqlx::query(&sql).fetch(&pool).map(|row| {
                row.map_err(statement_error)
                    .and_then(|row| converter.row_to_record(&row))
            });
            sink.forward(rows).await;
        });

        cursor.ready().await
    }

    async fn execute(&self, sql: &str, args: Vec<SqlValue>) -> Result<ExecResult> {
        log::debug!("PostgreSQL EXECUTE: {}", sql);
        log::debug!("  Parameters: {:?}", args);

        let mut query = sqlx::query(sql).persistent(false);
        for arg in args {
            query = PostgresTypeConverter::bind_param(query, arg);
        }

        let result = query.execute(&self.pool).await.map_err(statement_error)?;

        Ok(ExecResult {
            last_insert_id: None,
            rows_affected: result.rows_affected(),
        })
    }

    fn open_connections(&self) -> u32 {
        self.pool.size()
    }

    fn idle_connections(&self) -> u32 {
        self.pool.num_idle() as u32
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_fails_open() {
        let settings = ConnectionSettings::new("postgres", "not a url", 1, 1);
        assert!(PostgresDriver::new().open(&settings).await.is_err());
    }
}
