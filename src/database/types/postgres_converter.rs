//! PostgreSQL-specific type converter implementation

use super::converter::{DatabaseBackend, TypeConverter};
use super::value::SqlValue;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use ipnetwork::IpNetwork;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};

/// PostgreSQL type converter
#[derive(Clone, Default)]
pub struct PostgresTypeConverter;

impl PostgresTypeConverter {
    /// Create a new PostgreSQL type converter
    pub fn new() -> Self {
        PostgresTypeConverter
    }

    fn decode_err(kind: &str, e: sqlx::Error) -> Error {
        Error::statement(format!("Failed to extract {}: {}", kind, e))
    }

    /// Bind a SqlValue to a PostgreSQL query
    ///
    /// NULL is bound as an untyped text parameter so the server can infer
    /// the column type.
    pub fn bind_param<'q>(
        query: Query<'q, Postgres, PgArguments>,
        value: SqlValue,
    ) -> Query<'q, Postgres, PgArguments> {
        match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(i) => query.bind(i),
            SqlValue::Float(f) => query.bind(f),
            SqlValue::Text(s) => query.bind(s),
            SqlValue::Binary(b) => query.bind(b),
        }
    }
}

impl TypeConverter for PostgresTypeConverter {
    type Row = PgRow;

    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Postgres
    }

    fn extract_column_value(&self, row: &PgRow, column_index: usize) -> Result<SqlValue> {
        let column = row.columns().get(column_index).ok_or_else(|| {
            Error::statement(format!("Column index {} out of bounds", column_index))
        })?;

        if row
            .try_get_raw(column_index)
            .map_err(|e| Self::decode_err("raw value", e))?
            .is_null()
        {
            return Ok(SqlValue::Null);
        }

        let type_info = column.type_info();
        let type_name = type_info.name();

        match type_name {
            "BOOL" => row
                .try_get::<bool, _>(column_index)
                .map(SqlValue::from)
                .map_err(|e| Self::decode_err("bool", e)),
            "INT2" => row
                .try_get::<i16, _>(column_index)
                .map(|v| SqlValue::Integer(v as i64))
                .map_err(|e| Self::decode_err("smallint", e)),
            "INT4" => row
                .try_get::<i32, _>(column_index)
                .map(SqlValue::from)
                .map_err(|e| Self::decode_err("int", e)),
            "INT8" => row
                .try_get::<i64, _>(column_index)
                .map(SqlValue::Integer)
                .map_err(|e| Self::decode_err("bigint", e)),
            "FLOAT4" => row
                .try_get::<f32, _>(column_index)
                .map(SqlValue::from)
                .map_err(|e| Self::decode_err("float", e)),
            "FLOAT8" => row
                .try_get::<f64, _>(column_index)
                .map(SqlValue::Float)
                .map_err(|e| Self::decode_err("double", e)),
            "NUMERIC" => row
                .try_get::<rust_decimal::Decimal, _>(column_index)
                .map(SqlValue::from)
                .map_err(|e| Self::decode_err("numeric", e)),
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
                .try_get::<String, _>(column_index)
                .map(SqlValue::Text)
                .map_err(|e| Self::decode_err("string", e)),
            "JSON" | "JSONB" => row
                .try_get::<JsonValue, _>(column_index)
                .map(|v| SqlValue::Text(v.to_string()))
                .map_err(|e| Self::decode_err("JSON", e)),
            "TIMESTAMP" => row
                .try_get::<NaiveDateTime, _>(column_index)
                .map(SqlValue::from)
                .map_err(|e| Self::decode_err("timestamp", e)),
            "TIMESTAMPTZ" => row
                .try_get::<DateTime<Utc>, _>(column_index)
                .map(SqlValue::from)
                .map_err(|e| Self::decode_err("timestamptz", e)),
            "DATE" => row
                .try_get::<NaiveDate, _>(column_index)
                .map(SqlValue::from)
                .map_err(|e| Self::decode_err("date", e)),
            "TIME" => row
                .try_get::<NaiveTime, _>(column_index)
                .map(SqlValue::from)
                .map_err(|e| Self::decode_err("time", e)),
            "UUID" => row
                .try_get::<uuid::Uuid, _>(column_index)
                .map(SqlValue::from)
                .map_err(|e| Self::decode_err("uuid", e)),
            "BYTEA" => row
                .try_get::<Vec<u8>, _>(column_index)
                .map(SqlValue::Binary)
                .map_err(|e| Self::decode_err("bytea", e)),
            "INET" | "CIDR" => row
                .try_get::<IpNetwork, _>(column_index)
                .map(SqlValue::from)
                .map_err(|e| Self::decode_err("INET/CIDR", e)),
            _ => {
                // Custom enums and domains usually decode as text
                if let Ok(s) = row.try_get_unchecked::<String, _>(column_index) {
                    return Ok(SqlValue::Text(s));
                }
                log::error!(
                    "Failed to extract value for column '{}' with type '{}'",
                    column.name(),
                    type_name
                );
                Err(Error::statement(format!(
                    "Unsupported PostgreSQL type '{}' for column '{}'",
                    type_name,
                    column.name()
                )))
            }
        }
    }
}
