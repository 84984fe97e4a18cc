//! Anomaly audit log

use super::models::Anomaly;
use crate::db::{from_millis, to_millis};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

pub fn insert_anomaly(conn: &Connection, anomaly: &Anomaly) -> Result<i64> {
    conn.execute(
        "INSERT INTO anomalies (asset_id, kind, old_value, new_value, percentage_change,
             threshold_pct, description, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            anomaly.asset_id,
            anomaly.kind.as_str(),
            anomaly.old_value,
            anomaly.new_value,
            anomaly.percentage_change,
            anomaly.threshold_pct,
            anomaly.description,
            to_millis(&anomaly.timestamp),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Anomalies newest first, optionally for one asset and/or since a time
pub fn get_anomalies(
    conn: &Connection,
    asset_id: Option<&str>,
    since: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<Anomaly>> {
    let mut stmt = conn.prepare(
        "SELECT asset_id, kind, old_value, new_value, percentage_change, threshold_pct,
                description, timestamp
         FROM anomalies
         WHERE (?1 IS NULL OR asset_id = ?1) AND (?2 IS NULL OR timestamp >= ?2)
         ORDER BY timestamp DESC, id DESC
         LIMIT ?3",
    )?;

    let rows = stmt
        .query_map(params![asset_id, since.map(|t| to_millis(&t)), limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(asset_id, kind, old_value, new_value, pct, threshold_pct, description, ts)| -> Result<Anomaly> {
            Ok(Anomaly {
                asset_id,
                kind: kind.parse()?,
                old_value,
                new_value,
                percentage_change: pct,
                threshold_pct,
                description,
                timestamp: from_millis(ts),
            })
        })
        .collect()
}
