//! MySQL-specific type converter implementation

use super::converter::{DatabaseBackend, TypeConverter};
use super::value::SqlValue;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Row, TypeInfo, ValueRef};

/// How a MySQL column is decoded, chosen from its reported type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MySqlColumnKind {
    TinyInt,
    Integer,
    Year,
    Unsigned,
    Float,
    Double,
    Decimal,
    Text,
    Json,
    Date,
    Time,
    DateTime,
    Binary,
    Other,
}

impl MySqlColumnKind {
    fn of(type_name: &str) -> Self {
        match type_name {
            "BOOLEAN" | "BOOL" | "TINYINT" => MySqlColumnKind::TinyInt,
            "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" => MySqlColumnKind::Integer,
            // sqlx only decodes YEAR into unsigned integers
            "YEAR" => MySqlColumnKind::Year,
            "FLOAT" => MySqlColumnKind::Float,
            "DOUBLE" | "REAL" => MySqlColumnKind::Double,
            "DECIMAL" | "NUMERIC" => MySqlColumnKind::Decimal,
            "VARCHAR" | "CHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM"
            | "SET" => MySqlColumnKind::Text,
            "JSON" => MySqlColumnKind::Json,
            "DATE" => MySqlColumnKind::Date,
            "TIME" => MySqlColumnKind::Time,
            "DATETIME" | "TIMESTAMP" => MySqlColumnKind::DateTime,
            "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => {
                MySqlColumnKind::Binary
            }
            _ if type_name.contains("UNSIGNED") => MySqlColumnKind::Unsigned,
            _ => MySqlColumnKind::Other,
        }
    }
}

/// MySQL type converter
#[derive(Clone, Default)]
pub struct MySqlTypeConverter;

impl MySqlTypeConverter {
    /// Create a new MySQL type converter
    pub fn new() -> Self {
        MySqlTypeConverter
    }

    fn decode_err(kind: &str, e: sqlx::Error) -> Error {
        Error::statement(format!("Failed to extract {}: {}", kind, e))
    }

    /// TINYINT(1) is reported as BOOLEAN; keep the stored number when possible
    fn extract_tinyint(row: &MySqlRow, index: usize) -> Result<SqlValue> {
        if let Ok(val) = row.try_get::<i8, _>(index) {
            return Ok(SqlValue::Integer(val as i64));
        }
        row.try_get::<bool, _>(index)
            .map(SqlValue::from)
            .map_err(|e| Self::decode_err("tinyint", e))
    }

    /// Unsigned integers; BIGINT UNSIGNED above i64::MAX falls back to text
    fn extract_unsigned(row: &MySqlRow, index: usize) -> Result<SqlValue> {
        let val: u64 = row
            .try_get(index)
            .map_err(|e| Self::decode_err("unsigned integer", e))?;
        Ok(i64::try_from(val)
            .map(SqlValue::Integer)
            .unwrap_or_else(|_| SqlValue::Text(val.to_string())))
    }

    fn extract_datetime(row: &MySqlRow, index: usize, type_name: &str) -> Result<SqlValue> {
        if type_name == "TIMESTAMP" {
            if let Ok(val) = row.try_get::<DateTime<Utc>, _>(index) {
                return Ok(SqlValue::from(val));
            }
        }
        row.try_get::<NaiveDateTime, _>(index)
            .map(SqlValue::from)
            .map_err(|e| Self::decode_err("datetime", e))
    }

    /// Bind a SqlValue to a MySQL query
    pub fn bind_param<'q>(
        query: Query<'q, MySql, MySqlArguments>,
        value: SqlValue,
    ) -> Query<'q, MySql, MySqlArguments> {
        match value {
            SqlValue::Null => query.bind(None::<i64>),
            SqlValue::Integer(i) => query.bind(i),
            SqlValue::Float(f) => query.bind(f),
            SqlValue::Text(s) => query.bind(s),
            SqlValue::Binary(b) => query.bind(b),
        }
    }
}

impl TypeConverter for MySqlTypeConverter {
    type Row = MySqlRow;

    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MySQL
    }

    fn extract_column_value(&self, row: &MySqlRow, column_index: usize) -> Result<SqlValue> {
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

        match MySqlColumnKind::of(type_name) {
            MySqlColumnKind::TinyInt => Self::extract_tinyint(row, column_index),
            MySqlColumnKind::Integer => row
                .try_get::<i64, _>(column_index)
                .map(SqlValue::Integer)
                .map_err(|e| Self::decode_err("integer", e)),
            MySqlColumnKind::Year => row
                .try_get::<u16, _>(column_index)
                .map(|v| SqlValue::Integer(v as i64))
                .map_err(|e| Self::decode_err("year", e)),
            MySqlColumnKind::Unsigned => Self::extract_unsigned(row, column_index),
            MySqlColumnKind::Float => row
                .try_get::<f32, _>(column_index)
                .map(|v| SqlValue::Float(v as f64))
                .map_err(|e| Self::decode_err("float", e)),
            MySqlColumnKind::Double => row
                .try_get::<f64, _>(column_index)
                .map(SqlValue::Float)
                .map_err(|e| Self::decode_err("double", e)),
            MySqlColumnKind::Decimal => row
                .try_get::<rust_decimal::Decimal, _>(column_index)
                .map(SqlValue::from)
                .map_err(|e| Self::decode_err("decimal", e)),
            MySqlColumnKind::Text => row
                .try_get::<String, _>(column_index)
                .map(SqlValue::Text)
                .map_err(|e| Self::decode_err("string", e)),
            MySqlColumnKind::Json => row
                .try_get::<JsonValue, _>(column_index)
                .map(|v| SqlValue::Text(v.to_string()))
                .map_err(|e| Self::decode_err("JSON", e)),
            MySqlColumnKind::Date => row
                .try_get::<NaiveDate, _>(column_index)
                .map(SqlValue::from)
                .map_err(|e| Self::decode_err("date", e)),
            MySqlColumnKind::Time => row
                .try_get::<NaiveTime, _>(column_index)
                .map(SqlValue::from)
                .map_err(|e| Self::decode_err("time", e)),
            MySqlColumnKind::DateTime => Self::extract_datetime(row, column_index, type_name),
            MySqlColumnKind::Binary => row
                .try_get::<Vec<u8>, _>(column_index)
                .map(SqlValue::Binary)
                .map_err(|e| Self::decode_err("binary", e)),
            MySqlColumnKind::Other => {
                // Unknown types: prefer text, keep raw bytes otherwise
                if let Ok(s) = row.try_get::<String, _>(column_index) {
                    Ok(SqlValue::Text(s))
                } else if let Ok(b) = row.try_get::<Vec<u8>, _>(column_index) {
                    Ok(SqlValue::Binary(b))
                } else {
                    log::warn!(
                        "Unknown MySQL type '{}' for column '{}'",
                        type_name,
                        column.name()
                    );
                    Err(Error::statement(format!(
                        "Unsupported MySQL type '{}' for column '{}'",
                        type_name,
                        column.name()
                    )))
                }
            }
        }
    }
}
