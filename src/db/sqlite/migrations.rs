//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_assets", CREATE_ASSETS_TABLE)?;
    run_migration(conn, "002_indicator_values", CREATE_INDICATOR_VALUES_TABLE)?;
    run_migration(conn, "003_anomalies", CREATE_ANOMALIES_TABLE)?;
    run_migration(conn, "004_alerts", CREATE_ALERTS_TABLE)?;
    run_migration(conn, "005_correlations", CREATE_CORRELATIONS_TABLE)?;
    run_migration(conn, "006_asset_profiles", CREATE_ASSET_PROFILES_TABLE)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_ASSETS_TABLE: &str = r#"
CREATE TABLE assets (
    id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL,
    name TEXT NOT NULL,
    current_price REAL NOT NULL,
    market_cap REAL,
    market_cap_rank INTEGER,
    price_change_percentage_24h REAL,
    total_volume REAL,
    circulating_supply REAL,
    total_supply REAL,
    max_supply REAL,
    last_updated INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_assets_rank ON assets(market_cap_rank);
"#;

const CREATE_INDICATOR_VALUES_TABLE: &str = r#"
CREATE TABLE indicator_values (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    value REAL NOT NULL,
    params TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX idx_indicator_values_asset_kind ON indicator_values(asset_id, kind, timestamp);
"#;

const CREATE_ANOMALIES_TABLE: &str = r#"
CREATE TABLE anomalies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    old_value REAL NOT NULL,
    new_value REAL NOT NULL,
    percentage_change REAL NOT NULL,
    threshold_pct REAL NOT NULL,
    description TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX idx_anomalies_asset ON anomalies(asset_id, timestamp);
"#;

const CREATE_ALERTS_TABLE: &str = r#"
CREATE TABLE alerts (
    id TEXT PRIMARY KEY,
    asset_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    old_value REAL,
    new_value REAL,
    percentage_change REAL,
    message TEXT NOT NULL,
    severity TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX idx_alerts_asset ON alerts(asset_id, timestamp);
CREATE INDEX idx_alerts_severity ON alerts(severity, timestamp);
"#;

const CREATE_CORRELATIONS_TABLE: &str = r#"
CREATE TABLE correlations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_a TEXT NOT NULL,
    asset_b TEXT NOT NULL,
    value REAL NOT NULL,
    timeframe TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    CHECK (asset_a < asset_b)
);

CREATE INDEX idx_correlations_timeframe ON correlations(timeframe, timestamp);
"#;

const CREATE_ASSET_PROFILES_TABLE: &str = r#"
CREATE TABLE asset_profiles (
    asset_id TEXT PRIMARY KEY,
    description TEXT,
    categories TEXT NOT NULL,
    homepage TEXT,
    all_time_high REAL,
    all_time_low REAL,
    price_change_percentage_7d REAL,
    price_change_percentage_30d REAL,
    updated_at INTEGER NOT NULL
);
"#;
