//! DuckDB database module for the price time series

pub mod models;
mod migrations;

use crate::db::{from_millis, to_millis};
use crate::error::Result;
use chrono::{DateTime, Utc};
use duckdb::Connection;
use models::PricePoint;
use parking_lot::Mutex;
use std::path::Path;

/// DuckDB database wrapper
pub struct DuckDb {
    conn: Mutex<Connection>,
}

impl DuckDb {
    /// Open (or create) the database file and run migrations
    pub fn new(path: &Path) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    /// Append price points; a point already stored for the same asset and
    /// timestamp is left untouched. Returns the number of new rows.
    pub fn append_price_points(&self, points: &[PricePoint]) -> Result<usize> {
        let mut conn = self.conn.lock();

        let tx = conn.transaction()?;

        let mut stmt = tx.prepare(
            "INSERT INTO price_points (asset_id, price, market_cap, volume, timestamp)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (asset_id, timestamp) DO NOTHING",
        )?;

        let mut count = 0;
        for point in points {
            count += stmt.execute(duckdb::params![
                point.asset_id,
                point.price,
                point.market_cap,
                point.volume,
                to_millis(&point.timestamp),
            ])?;
        }

        drop(stmt);
        tx.commit()?;

        Ok(count)
    }

    /// Price history for an asset within `[from, to]`, oldest first
    pub fn price_history(
        &self,
        asset_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PricePoint>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT asset_id, price, market_cap, volume, timestamp
             FROM price_points
             WHERE asset_id = ? AND timestamp >= ? AND timestamp <= ?
             ORDER BY timestamp ASC",
        )?;

        let rows = stmt
            .query_map(
                duckdb::params![asset_id, to_millis(&from), to_millis(&to)],
                |row| {
                    Ok(PricePoint {
                        asset_id: row.get(0)?,
                        price: row.get(1)?,
                        market_cap: row.get(2)?,
                        volume: row.get(3)?,
                        timestamp: from_millis(row.get(4)?),
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Delete points older than `cutoff`; returns rows removed
    pub fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM price_points WHERE timestamp < ?",
            duckdb::params![to_millis(&cutoff)],
        )?;
        Ok(removed)
    }

    pub fn count_price_points(&self, asset_id: &str) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM price_points WHERE asset_id = ?",
            [asset_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
