//! Type conversion trait and base utilities
//!
//! Each engine has one converter that decodes its rows into `Record`s and
//! binds `SqlValue` arguments onto its queries.

use super::value::{Record, SqlValue};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Column, Row};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Database engine family behind a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseBackend {
    Postgres,
    MySQL,
    SQLite,
}

impl DatabaseBackend {
    /// Positional placeholder for the 1-based parameter `index`
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            DatabaseBackend::Postgres => format!("${}", index),
            DatabaseBackend::MySQL | DatabaseBackend::SQLite => "?".to_string(),
        }
    }

    /// Number of positional arguments `sql` expects
    ///
    /// Quoted text and comments are skipped. Numbered placeholders (`?NNN`
    /// on SQLite, `$N` on PostgreSQL) count up to the highest index used.
    pub fn placeholder_count(&self, sql: &str) -> usize {
        let mut highest = 0;
        let mut chars = sql.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\'' | '"' | '`' => self.skip_quoted(&mut chars, c),
                '-' if chars.peek() == Some(&'-') => {
                    for next in chars.by_ref() {
                        if next == '\n' {
                            break;
                        }
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    let mut prev = '\0';
                    for next in chars.by_ref() {
                        if prev == '*' && next == '/' {
                            break;
                        }
                        prev = next;
                    }
                }
                '?' if *self != DatabaseBackend::Postgres => {
                    highest = match take_index(&mut chars) {
                        Some(index) => highest.max(index),
                        None => highest + 1,
                    };
                }
                '$' if *self == DatabaseBackend::Postgres => {
                    if let Some(index) = take_index(&mut chars) {
                        highest = highest.max(index);
                    }
                }
                _ => {}
            }
        }

        highest
    }

    fn skip_quoted(&self, chars: &mut Peekable<Chars<'_>>, quote: char) {
        while let Some(next) = chars.next() {
            if next == '\\' && *self == DatabaseBackend::MySQL {
                chars.next();
            } else if next == quote {
                break;
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseBackend::Postgres => "postgres",
            DatabaseBackend::MySQL => "mysql",
            DatabaseBackend::SQLite => "sqlite",
        }
    }
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn take_index(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut digits = String::new();
    while let Some(&d) = chars.peek() {
        if !d.is_ascii_digit() {
            break;
        }
        digits.push(d);
        chars.next();
    }
    digits.parse().ok()
}

/// Row decoding for one database backend
pub trait TypeConverter: Send + Sync {
    type Row: Row;

    /// Get the database backend this converter is for
    fn backend(&self) -> DatabaseBackend;

    /// Extract a single column value, mapping SQL NULL to `SqlValue::Null`
    fn extract_column_value(&self, row: &Self::Row, column_index: usize) -> Result<SqlValue>;

    /// Decode every column of a row, in select-list order
    fn row_to_record(&self, row: &Self::Row) -> Result<Record> {
        let columns = row.columns();
        let mut record = Record::with_capacity(columns.len());

        for (index, column) in columns.iter().enumerate() {
            let value = self.extract_column_value(row, index).map_err(|e| {
                Error::statement(format!(
                    "failed to decode column '{}': {}",
                    column.name(),
                    e
                ))
            })?;
            record.insert(column.name().to_string(), value);
        }

        Ok(record)
    }
}
