//! Correlation edge storage

use super::models::CorrelationEdge;
use crate::db::{from_millis, to_millis};
use crate::error::{AppError, Result};
use rusqlite::{params, Connection};

/// Insert canonical edges (`asset_a < asset_b`) in one transaction
pub fn insert_correlations(conn: &mut Connection, edges: &[CorrelationEdge]) -> Result<usize> {
    if let Some(bad) = edges.iter().find(|e| e.asset_a >= e.asset_b) {
        return Err(AppError::Persistence(format!(
            "correlation edge {}/{} is not canonical",
            bad.asset_a, bad.asset_b
        )));
    }

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO correlations (asset_a, asset_b, value, timeframe, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for edge in edges {
            stmt.execute(params![
                edge.asset_a,
                edge.asset_b,
                edge.value,
                edge.timeframe,
                to_millis(&edge.timestamp),
            ])?;
        }
    }
    tx.commit()?;
    Ok(edges.len())
}

/// Edges from the most recent calculation for a timeframe
pub fn latest_correlations(conn: &Connection, timeframe: &str) -> Result<Vec<CorrelationEdge>> {
    let mut stmt = conn.prepare(
        "SELECT asset_a, asset_b, value, timeframe, timestamp
         FROM correlations
         WHERE timeframe = ?1
           AND timestamp = (SELECT MAX(timestamp) FROM correlations WHERE timeframe = ?1)
         ORDER BY asset_a, asset_b",
    )?;

    let edges = stmt
        .query_map([timeframe], |row| {
            Ok(CorrelationEdge {
                asset_a: row.get(0)?,
                asset_b: row.get(1)?,
                value: row.get(2)?,
                timeframe: row.get(3)?,
                timestamp: from_millis(row.get(4)?),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::migrations::run_migrations;
    use chrono::{Duration, Utc};

    fn edge(a: &str, b: &str, value: f64, ts: chrono::DateTime<chrono::Utc>) -> CorrelationEdge {
        CorrelationEdge {
            asset_a: a.into(),
            asset_b: b.into(),
            value,
            timeframe: "7d".into(),
            timestamp: ts,
        }
    }

    #[test]
    fn test_latest_matrix_replaces_older() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let earlier = Utc::now() - Duration::minutes(5);
        let now = Utc::now();

        insert_correlations(&mut conn, &[edge("bitcoin", "ethereum", 0.5, earlier)]).unwrap();
        insert_correlations(
            &mut conn,
            &[
                edge("bitcoin", "ethereum", 0.9, now),
                edge("bitcoin", "solana", 0.7, now),
            ],
        )
        .unwrap();

        let latest = latest_correlations(&conn, "7d").unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].value, 0.9);
        assert!(latest_correlations(&conn, "30d").unwrap().is_empty());
    }

    #[test]
    fn test_non_canonical_edge_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let result = insert_correlations(&mut conn, &[edge("solana", "bitcoin", 0.1, Utc::now())]);
        assert!(matches!(result, Err(AppError::Persistence(_))));
    }
}
