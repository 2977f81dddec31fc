//! SQLite driver implementation

use super::{connection_error, pool_options, statement_error};
use crate::database::cursor::RowCursor;
use crate::database::driver::{ConnectionSettings, DatabaseHandle, Driver, ExecResult};
use crate::database::types::{DatabaseBackend, SqlValue, SqliteTypeConverter, TypeConverter};
use crate::error::Result;
use async_trait::async_trait;
use futures::StreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Connection;
use std::str::FromStr;
use std::sync::Arc;

/// Opens SQLite pools from a path, `sqlite:` URL or `:memory:`
#[derive(Debug, Clone, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        SqliteDriver
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn open(&self, settings: &ConnectionSettings) -> Result<Arc<dyn DatabaseHandle>> {
        let options = SqliteConnectOptions::from_str(&settings.url)
            .map_err(|e| connection_error("sqlite", e))?
            .create_if_missing(true);

        let mut builder = pool_options(settings);
        if is_in_memory(&settings.url) {
            // The database lives only as long as one of its connections
            builder = builder.idle_timeout(None).max_lifetime(None);
        }

        let pool = builder.connect_lazy_with(options);
        Ok(Arc::new(SqliteHandle::from_pool(pool)))
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// A live SQLite pool
#[derive(Clone)]
pub struct SqliteHandle {
    pool: SqlitePool,
    converter: SqliteTypeConverter,
}

impl SqliteHandle {
    /// Create handle from existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            converter: SqliteTypeConverter::new(),
        }
    }
}

#[async_trait]
impl DatabaseHandle for SqliteHandle {
    fn driver(&self) -> &str {
        "sqlite"
    }

    fn backend(&self) -> Option<DatabaseBackend> {
        Some(self.converter.backend())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| connection_error("sqlite", e))?;
        conn.ping().await.map_err(|e| connection_error("sqlite", e))
    }

    async fn query(&self, sql: &str) -> Result<RowCursor> {
        log::debug!("SQLite QUERY: {}", sql);

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
        log::debug!("SQLite EXECUTE: {}", sql);
        log::debug!("  Parameters: {:?}", args);

        let mut query = sqlx::query(sql).persistent(false);
        for arg in args {
            query = SqliteTypeConverter::bind_param(query, arg);
        }

        let result = query.execute(&self.pool).await.map_err(statement_error)?;

        Ok(ExecResult {
            last_insert_id: Some(result.last_insert_rowid()),
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

    async fn open_memory() -> Arc<dyn DatabaseHandle> {
        let settings = ConnectionSettings::new("sqlite", ":memory:", 1, 1);
        SqliteDriver::new().open(&settings).await.unwrap()
    }

    #[test]
    fn test_in_memory_detection() {
        assert!(is_in_memory(":memory:"));
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("file:test?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://data/app.db"));
    }

    #[tokio::test]
    async fn test_ping_and_stats() {
        let handle = open_memory().await;
        handle.ping().await.unwrap();
        assert_eq!(handle.driver(), "sqlite");
        assert_eq!(handle.open_connections(), 1);
        handle.close().await;
    }

    #[tokio::test]
    async fn test_execute_reports_last_insert_id() {
        let handle = open_memory().await;
        handle
            .execute("create table t (id integer primary key, name text)", vec![])
            .await
            .unwrap();

        let result = handle
            .execute(
                "insert into t (name) values (?)",
                vec![SqlValue::from("a")],
            )
            .await
            .unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(result.last_insert_id, Some(1));

        let rows = handle
            .query("select id, name from t")
            .await
            .unwrap()
            .collect_all()
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], SqlValue::Text("a".to_string()));
    }

    #[tokio::test]
    async fn test_query_error_surfaces_before_cursor() {
        let handle = open_memory().await;
        let err = handle.query("select * from missing").await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
