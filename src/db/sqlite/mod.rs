//! SQLite database module for assets, profiles, indicators, anomalies, alerts
//! and correlations

pub mod models;
mod migrations;
mod assets;
mod asset_profiles;
mod indicators;
mod anomalies;
mod alerts;
mod correlations;

use crate::error::Result;
use chrono::{DateTime, Utc};
use models::*;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Open (or create) the database file and run migrations
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL lets readers proceed while a cycle is writing
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// Private in-memory database
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

    // ========== Asset Methods ==========

    /// Insert or update an asset; true if it was new
    pub fn upsert_asset(&self, asset: &Asset) -> Result<bool> {
        let conn = self.conn.lock();
        assets::upsert_asset(&conn, asset)
    }

    pub fn get_asset(&self, id: &str) -> Result<Option<Asset>> {
        let conn = self.conn.lock();
        assets::get_asset(&conn, id)
    }

    pub fn list_assets(&self) -> Result<Vec<Asset>> {
        let conn = self.conn.lock();
        assets::list_assets(&conn)
    }

    pub fn upsert_asset_profile(&self, profile: &AssetProfile) -> Result<()> {
        let conn = self.conn.lock();
        asset_profiles::upsert_asset_profile(&conn, profile)
    }

    pub fn get_asset_profile(&self, asset_id: &str) -> Result<Option<AssetProfile>> {
        let conn = self.conn.lock();
        asset_profiles::get_asset_profile(&conn, asset_id)
    }

    // ========== Indicator Methods ==========

    pub fn insert_indicator_values(&self, values: &[IndicatorValue]) -> Result<usize> {
        let mut conn = self.conn.lock();
        indicators::insert_indicator_values(&mut conn, values)
    }

    pub fn get_indicator_values(
        &self,
        asset_id: &str,
        kind: Option<IndicatorKind>,
        limit: i64,
    ) -> Result<Vec<IndicatorValue>> {
        let conn = self.conn.lock();
        indicators::get_indicator_values(&conn, asset_id, kind, limit)
    }

    /// Values from the latest indicator calculation for an asset
    pub fn latest_indicator_values(&self, asset_id: &str) -> Result<Vec<IndicatorValue>> {
        let conn = self.conn.lock();
        indicators::latest_indicator_values(&conn, asset_id)
    }

    // ========== Anomaly Methods ==========

    pub fn insert_anomaly(&self, anomaly: &Anomaly) -> Result<i64> {
        let conn = self.conn.lock();
        anomalies::insert_anomaly(&conn, anomaly)
    }

    pub fn get_anomalies(
        &self,
        asset_id: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Anomaly>> {
        let conn = self.conn.lock();
        anomalies::get_anomalies(&conn, asset_id, since, limit)
    }

    // ========== Alert Methods ==========

    pub fn insert_alert(&self, alert: &Alert) -> Result<()> {
        let conn = self.conn.lock();
        alerts::insert_alert(&conn, alert)
    }

    pub fn query_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        let conn = self.conn.lock();
        alerts::query_alerts(&conn, query)
    }

    // ========== Correlation Methods ==========

    pub fn insert_correlations(&self, edges: &[CorrelationEdge]) -> Result<usize> {
        let mut conn = self.conn.lock();
        correlations::insert_correlations(&mut conn, edges)
    }

    /// Edges of the most recent matrix for a timeframe label
    pub fn latest_correlations(&self, timeframe: &str) -> Result<Vec<CorrelationEdge>> {
        let conn = self.conn.lock();
        correlations::latest_correlations(&conn, timeframe)
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_database_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coinsight.db");

        {
            let db = SqliteDb::new(&path).unwrap();
            let asset = Asset {
                id: "bitcoin".into(),
                symbol: "btc".into(),
                name: "Bitcoin".into(),
                current_price: 42_000.0,
                market_cap: None,
                market_cap_rank: Some(1),
                price_change_percentage_24h: None,
                total_volume: None,
                circulating_supply: None,
                total_supply: None,
                max_supply: None,
                last_updated: Utc::now(),
            };
            assert!(db.upsert_asset(&asset).unwrap());
        }

        let reopened = SqliteDb::new(&path).unwrap();
        assert_eq!(reopened.list_assets().unwrap().len(), 1);
    }
}
