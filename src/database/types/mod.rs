//! Unified type system for database operations
//!
//! Values, records and the per-backend converters that produce them.

pub mod converter;
pub mod mysql_converter;
pub mod postgres_converter;
pub mod sqlite_converter;
pub mod value;

// Re-export the main types
pub use converter::{DatabaseBackend, TypeConverter};
pub use mysql_converter::MySqlTypeConverter;
pub use postgres_converter::PostgresTypeConverter;
pub use sqlite_converter::SqliteTypeConverter;
pub use value::{record_to_json, Record, SqlValue};
