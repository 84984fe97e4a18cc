//! Alert storage and filtered queries

use super::models::{Alert, AlertQuery};
use crate::db::{from_millis, to_millis};
use crate::error::{AppError, Result};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use uuid::Uuid;

const DEFAULT_LIMIT: u32 = 100;

pub fn insert_alert(conn: &Connection, alert: &Alert) -> Result<()> {
    conn.execute(
        "INSERT INTO alerts (id, asset_id, kind, old_value, new_value, percentage_change,
             message, severity, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            alert.id.to_string(),
            alert.asset_id,
            alert.kind.as_str(),
            alert.old_value,
            alert.new_value,
            alert.percentage_change,
            alert.message,
            alert.severity.as_str(),
            to_millis(&alert.timestamp),
        ],
    )?;
    Ok(())
}

/// Alerts matching every set filter, newest first
pub fn query_alerts(conn: &Connection, query: &AlertQuery) -> Result<Vec<Alert>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(asset_id) = &query.asset_id {
        clauses.push("asset_id = ?");
        values.push(Value::Text(asset_id.clone()));
    }
    if let Some(severity) = query.severity {
        clauses.push("severity = ?");
        values.push(Value::Text(severity.as_str().to_string()));
    }
    if let Some(kind) = query.kind {
        clauses.push("kind = ?");
        values.push(Value::Text(kind.as_str().to_string()));
    }
    if let Some(from) = &query.from {
        clauses.push("timestamp >= ?");
        values.push(Value::Integer(to_millis(from)));
    }
    if let Some(to) = &query.to {
        clauses.push("timestamp <= ?");
        values.push(Value::Integer(to_millis(to)));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    values.push(Value::Integer(query.limit.unwrap_or(DEFAULT_LIMIT) as i64));

    let sql = format!(
        "SELECT id, asset_id, kind, old_value, new_value, percentage_change, message, severity, timestamp
         FROM alerts {} ORDER BY timestamp DESC LIMIT ?",
        where_clause
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<f64>>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, i64>(8)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(id, asset_id, kind, old_value, new_value, pct, message, severity, ts)| -> Result<Alert> {
                Ok(Alert {
                    id: Uuid::parse_str(&id)
                        .map_err(|e| AppError::DataShape(format!("alert id '{}': {}", id, e)))?,
                    asset_id,
                    kind: kind.parse()?,
                    old_value,
                    new_value,
                    percentage_change: pct,
                    message,
                    severity: severity.parse()?,
                    timestamp: from_millis(ts),
                })
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::migrations::run_migrations;
    use crate::db::sqlite::models::{AlertKind, Severity};
    use chrono::{Duration, Utc};

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn alert(asset: &str, kind: AlertKind, severity: Severity, minutes_ago: i64) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            asset_id: asset.into(),
            kind,
            old_value: Some(100.0),
            new_value: Some(110.0),
            percentage_change: Some(10.0),
            message: format!("{} {}", asset, kind),
            severity,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn seed(conn: &Connection) {
        insert_alert(conn, &alert("bitcoin", AlertKind::PriceSurge, Severity::High, 30)).unwrap();
        insert_alert(conn, &alert("bitcoin", AlertKind::RsiOverbought, Severity::Medium, 20)).unwrap();
        insert_alert(conn, &alert("ethereum", AlertKind::PriceIncrease, Severity::Medium, 10)).unwrap();
        insert_alert(conn, &alert("ethereum", AlertKind::VolumeSpike, Severity::High, 0)).unwrap();
    }

    #[test]
    fn test_query_without_filters_returns_newest_first() {
        let conn = create_test_db();
        seed(&conn);

        let all = query_alerts(&conn, &AlertQuery::default()).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].kind, AlertKind::VolumeSpike);
        assert_eq!(all[3].kind, AlertKind::PriceSurge);
    }

    #[test]
    fn test_query_filters_combine() {
        let conn = create_test_db();
        seed(&conn);

        let high_btc = query_alerts(
            &conn,
            &AlertQuery {
                asset_id: Some("bitcoin".into()),
                severity: Some(Severity::High),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(high_btc.len(), 1);
        assert_eq!(high_btc[0].kind, AlertKind::PriceSurge);

        let by_kind = query_alerts(
            &conn,
            &AlertQuery {
                kind: Some(AlertKind::PriceIncrease),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_kind.len(), 1);
        assert_eq!(by_kind[0].asset_id, "ethereum");
    }

    #[test]
    fn test_query_date_range_and_limit() {
        let conn = create_test_db();
        seed(&conn);

        let recent = query_alerts(
            &conn,
            &AlertQuery {
                from: Some(Utc::now() - Duration::minutes(15)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(recent.len(), 2);

        let limited = query_alerts(
            &conn,
            &AlertQuery {
                limit: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_alert_round_trips_identity() {
        let conn = create_test_db();
        let original = alert("solana", AlertKind::StrongBuySignal, Severity::High, 0);
        insert_alert(&conn, &original).unwrap();

        let stored = query_alerts(&conn, &AlertQuery::default()).unwrap();
        assert_eq!(stored[0].id, original.id);
        assert_eq!(stored[0].severity, Severity::High);
    }
}
