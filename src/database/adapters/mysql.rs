//! MySQL / MariaDB driver implementation

use super::{connection_error, pool_options, statement_error};
use crate::database::cursor::RowCursor;
use crate::database::driver::{ConnectionSettings, DatabaseHandle, Driver, ExecResult};
use crate::database::types::{DatabaseBackend, MySqlTypeConverter, SqlValue, TypeConverter};
use crate::error::Result;
use async_trait::async_trait;
use futures::StreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool};
use sqlx::Connection;
use std::str::FromStr;
use std::sync::Arc;

/// Opens MySQL pools from a `mysql://` URL or a `user:pass@tcp(host:port)/db` DSN
#[derive(Debug, Clone, Default)]
pub struct MySqlDriver;

impl MySqlDriver {
    pub fn new() -> Self {
        MySqlDriver
    }
}

#[async_trait]
impl Driver for MySqlDriver {
    fn name(&self) -> &str {
        "mysql"
    }

    async fn open(&self, settings: &ConnectionSettings) -> Result<Arc<dyn DatabaseHandle>> {
        let url = normalize_dsn(&settings.url);
        let options =
            MySqlConnectOptions::from_str(&url).map_err(|e| connection_error("mysql", e))?;

        let pool = pool_options(settings).connect_lazy_with(options);
        Ok(Arc::new(MySqlHandle::from_pool(pool)))
    }
}

/// Rewrite a `user:pass@tcp(host:port)/db?params` DSN as a `mysql://` URL
///
/// DSN parameters are dropped; URLs pass through unchanged.
pub fn normalize_dsn(dsn: &str) -> String {
    if dsn.contains("://") {
        return dsn.to_string();
    }

    let (credentials, rest) = match dsn.rfind('@') {
        Some(pos) => (&dsn[..pos], &dsn[pos + 1..]),
        None => ("", dsn),
    };

    let (address, database) = match rest.find(")/") {
        Some(pos) if rest.starts_with("tcp(") => (&rest[4..pos], &rest[pos + 2..]),
        _ => match rest.split_once('/') {
            Some((addr, db)) => (addr, db),
            None => (rest, ""),
        },
    };
    let database = database.split('?').next().unwrap_or_default();
    let address = if address.is_empty() {
        "localhost"
    } else {
        address
    };

    if credentials.is_empty() {
        format!("mysql://{}/{}", address, database)
    } else {
        format!("mysql://{}@{}/{}", credentials, address, database)
    }
}

/// A live MySQL pool
#[derive(Clone)]
pub struct MySqlHandle {
    pool: MySqlPool,
    converter: MySqlTypeConverter,
}

impl MySqlHandle {
    /// Create handle from existing pool
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self {
            pool,
            converter: MySqlTypeConverter::new(),
        }
    }
}

#[async_trait]
impl DatabaseHandle for MySqlHandle {
    fn driver(&self) -> &str {
        "mysql"
    }

    fn backend(&self) -> Option<DatabaseBackend> {
        Some(self.converter.backend())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| connection_error("mysql", e))?;
        conn.ping().await.map_err(|e| connection_error("mysql", e))
    }

    async fn query(&self, sql: &str) -> Result<RowCursor> {
        log::debug!("MySQL QUERY: {}", sql);

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
        log::debug!("MySQL EXECUTE: {}", sql);
        log::debug!("  Parameters: {:?}", args);

        let mut query = sqlx::query(sql).persistent(false);
        for arg in args {
            query = MySqlTypeConverter::bind_param(query, arg);
        }

        let result = query.execute(&self.pool).await.map_err(statement_error)?;

        Ok(ExecResult {
            last_insert_id: Some(result.last_insert_id() as i64),
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
