//! SQLite-specific type converter implementation

use super::converter::{DatabaseBackend, TypeConverter};
use super::value::SqlValue;
use crate::error::{Error, Result};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::query::Query;
use sqlx::{Row, Sqlite, TypeInfo, ValueRef};

/// SQLite type converter
#[derive(Clone, Default)]
pub struct SqliteTypeConverter;

/// SQLite storage classes as reported for a stored value
#[derive(Debug, Clone, Copy, PartialEq)]
enum SqliteAffinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

impl SqliteTypeConverter {
    /// Create a new SQLite type converter
    pub fn new() -> Self {
        SqliteTypeConverter
    }

    /// Determine the SQLite type affinity
    fn get_type_affinity(type_name: &str) -> SqliteAffinity {
        let upper = type_name.to_uppercase();

        // https://www.sqlite.org/datatype3.html
        if upper.contains("INT") || upper == "BOOLEAN" {
            SqliteAffinity::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            SqliteAffinity::Text
        } else if upper.contains("BLOB") {
            SqliteAffinity::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            SqliteAffinity::Real
        } else {
            SqliteAffinity::Numeric
        }
    }

    /// Try each storage class in turn; NUMERIC columns may hold any of them
    fn extract_any(row: &SqliteRow, index: usize) -> Result<SqlValue> {
        if let Ok(val) = row.try_get::<i64, _>(index) {
            Ok(SqlValue::Integer(val))
        } else if let Ok(val) = row.try_get::<f64, _>(index) {
            Ok(SqlValue::Float(val))
        } else if let Ok(val) = row.try_get::<String, _>(index) {
            Ok(SqlValue::Text(val))
        } else if let Ok(val) = row.try_get::<Vec<u8>, _>(index) {
            Ok(SqlValue::Binary(val))
        } else {
            Err(Error::statement(format!(
                "unsupported SQLite value at column {}",
                index
            )))
        }
    }

    /// Bind a SqlValue to a SQLite query
    pub fn bind_param<'q>(
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
        value: SqlValue,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match value {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Integer(i) => query.bind(i),
            SqlValue::Float(f) => query.bind(f),
            SqlValue::Text(s) => query.bind(s),
            SqlValue::Binary(b) => query.bind(b),
        }
    }
}

impl TypeConverter for SqliteTypeConverter {
    type Row = SqliteRow;

    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::SQLite
    }

    fn extract_column_value(&self, row: &SqliteRow, column_index: usize) -> Result<SqlValue> {
        let raw = row.try_get_raw(column_index).map_err(|e| {
            Error::statement(format!(
                "Failed to get raw value at column {}: {}",
                column_index, e
            ))
        })?;

        if raw.is_null() {
            return Ok(SqlValue::Null);
        }

        let type_name = raw.type_info().name().to_string();

        let decoded = match Self::get_type_affinity(&type_name) {
            SqliteAffinity::Integer => row.try_get::<i64, _>(column_index).map(SqlValue::Integer),
            SqliteAffinity::Real => row.try_get::<f64, _>(column_index).map(SqlValue::Float),
            SqliteAffinity::Text => row.try_get::<String, _>(column_index).map(SqlValue::Text),
            SqliteAffinity::Blob => row.try_get::<Vec<u8>, _>(column_index).map(SqlValue::Binary),
            SqliteAffinity::Numeric => return Self::extract_any(row, column_index),
        };

        match decoded {
            Ok(value) => Ok(value),
            Err(e) => {
                log::trace!(
                    "SQLite column {} ({}) did not decode by affinity: {}",
                    column_index,
                    type_name,
                    e
                );
                Self::extract_any(row, column_index)
            }
        }
    }
}
