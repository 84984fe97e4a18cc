//! Indicator value storage

use super::models::{IndicatorKind, IndicatorParams, IndicatorValue};
use crate::db::{from_millis, to_millis};
use crate::error::{AppError, Result};
use rusqlite::{params, Connection};

/// Insert a batch of indicator values in one transaction
pub fn insert_indicator_values(conn: &mut Connection, values: &[IndicatorValue]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO indicator_values (asset_id, kind, value, params, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for value in values {
            let params_json = serde_json::to_string(&value.params)?;
            stmt.execute(params![
                value.asset_id,
                value.kind().as_str(),
                value.value,
                params_json,
                to_millis(&value.timestamp),
            ])?;
        }
    }
    tx.commit()?;
    Ok(values.len())
}

fn decode_row(asset_id: String, value: f64, params_json: String, timestamp: i64) -> Result<IndicatorValue> {
    let params: IndicatorParams = serde_json::from_str(&params_json)
        .map_err(|e| AppError::DataShape(format!("indicator params '{}': {}", params_json, e)))?;
    Ok(IndicatorValue {
        asset_id,
        value,
        params,
        timestamp: from_millis(timestamp),
    })
}

/// Indicator history for an asset, newest first, optionally one kind only
pub fn get_indicator_values(
    conn: &Connection,
    asset_id: &str,
    kind: Option<IndicatorKind>,
    limit: i64,
) -> Result<Vec<IndicatorValue>> {
    let mut stmt = conn.prepare(
        "SELECT asset_id, value, params, timestamp
         FROM indicator_values
         WHERE asset_id = ?1 AND (?2 IS NULL OR kind = ?2)
         ORDER BY timestamp DESC, id ASC
         LIMIT ?3",
    )?;

    let rows = stmt
        .query_map(params![asset_id, kind.map(|k| k.as_str()), limit], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<(String, f64, String, i64)>, _>>()?;

    rows.into_iter()
        .map(|(asset_id, value, params, ts)| decode_row(asset_id, value, params, ts))
        .collect()
}

/// Values from the most recent calculation for an asset
pub fn latest_indicator_values(conn: &Connection, asset_id: &str) -> Result<Vec<IndicatorValue>> {
    let mut stmt = conn.prepare(
        "SELECT asset_id, value, params, timestamp
         FROM indicator_values
         WHERE asset_id = ?1
           AND timestamp = (SELECT MAX(timestamp) FROM indicator_values WHERE asset_id = ?1)
         ORDER BY id ASC",
    )?;

    let rows = stmt
        .query_map([asset_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<(String, f64, String, i64)>, _>>()?;

    rows.into_iter()
        .map(|(asset_id, value, params, ts)| decode_row(asset_id, value, params, ts))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::migrations::run_migrations;
    use chrono::{Duration, Utc};

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn value(params: IndicatorParams, value: f64, ts: chrono::DateTime<Utc>) -> IndicatorValue {
        IndicatorValue {
            asset_id: "bitcoin".into(),
            value,
            params,
            timestamp: ts,
        }
    }

    #[test]
    fn test_params_survive_storage() {
        let mut conn = create_test_db();
        let now = Utc::now();
        let macd = IndicatorParams::MacdSignal { fast: 12, slow: 26, signal: 9 };
        insert_indicator_values(&mut conn, &[value(macd, -1.25, now)]).unwrap();

        let stored = get_indicator_values(&conn, "bitcoin", Some(IndicatorKind::MacdSignal), 10).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].params, macd);
        assert_eq!(stored[0].value, -1.25);
    }

    #[test]
    fn test_latest_returns_last_calculation_only() {
        let mut conn = create_test_db();
        let earlier = Utc::now() - Duration::minutes(5);
        let now = Utc::now();

        insert_indicator_values(
            &mut conn,
            &[
                value(IndicatorParams::Sma { period: 7 }, 100.0, earlier),
                value(IndicatorParams::Rsi { period: 14 }, 55.0, earlier),
            ],
        )
        .unwrap();
        insert_indicator_values(
            &mut conn,
            &[
                value(IndicatorParams::Sma { period: 7 }, 101.0, now),
                value(IndicatorParams::Rsi { period: 14 }, 61.0, now),
            ],
        )
        .unwrap();

        let latest = latest_indicator_values(&conn, "bitcoin").unwrap();
        assert_eq!(latest.len(), 2);
        assert!(latest.iter().all(|v| v.timestamp.timestamp_millis() == now.timestamp_millis()));

        let all_sma = get_indicator_values(&conn, "bitcoin", Some(IndicatorKind::Sma), 10).unwrap();
        assert_eq!(all_sma.len(), 2);
        assert_eq!(all_sma[0].value, 101.0);
    }
}
