//! DuckDB migrations

use crate::error::Result;
use duckdb::Connection;

/// Run all DuckDB migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            name VARCHAR PRIMARY KEY,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    )?;

    run_migration(conn, "001_price_points", CREATE_PRICE_POINTS)?;

    tracing::info!("DuckDB migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM migrations WHERE name = ?",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running DuckDB migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

// timestamp is epoch milliseconds
const CREATE_PRICE_POINTS: &str = r#"
CREATE TABLE IF NOT EXISTS price_points (
    asset_id VARCHAR NOT NULL,
    price DOUBLE NOT NULL,
    market_cap DOUBLE,
    volume DOUBLE,
    timestamp BIGINT NOT NULL,
    PRIMARY KEY (asset_id, timestamp)
);
"#;
