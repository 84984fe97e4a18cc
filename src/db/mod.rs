//! Persistence: SQLite for entities, DuckDB for the price time series

pub mod duckdb;
pub mod sqlite;

use chrono::{DateTime, Utc};

/// Timestamps are stored as epoch milliseconds in both databases
pub fn to_millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
