//! Database query modules for CRUD operations.
//!
//! Each module provides functions that operate on a borrowed connection, so
//! they compose inside a single [`Database::transaction`](super::Database::transaction)
//! or run standalone through [`Database::with_conn`](super::Database::with_conn).

pub mod accounts;
pub mod folders;
pub mod identities;
pub mod operations;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

/// Reads a text column and parses it into an enum-like value.
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Reads an RFC 3339 timestamp column.
pub(crate) fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads an optional RFC 3339 timestamp column.
pub(crate) fn parse_optional_timestamp(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}
