//! Storage for the pipeline
//!
//! A single SQLite database holds the domain source table and the
//! pipeline's checkpoint, ledger and semantic tables. Units of work are
//! scoped transactions handed out by [`Database`].

mod database;
mod error;
pub mod schema;

pub use database::Database;
pub use error::{StorageError, StorageResult};

use chrono::{DateTime, SecondsFormat, Utc};

/// Render a timestamp in the fixed-width form stored in every TEXT time column.
///
/// Fixed width (microseconds, `Z` suffix) keeps lexicographic order equal to
/// chronological order, which the ledger relies on when refreshing
/// `ingested_at`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored RFC 3339 timestamp.
pub fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::DateParse(format!("{}: {}", raw, e)))
}
