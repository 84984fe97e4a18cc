//! Alert Service
//!
//! Turns anomalies and indicator signals into persisted alerts. Repeats of
//! the same asset and alert kind inside one time bucket are dropped: the
//! bucket is one minute for anomaly alerts and one hour for indicator alerts.

use crate::analytics::indicators::{IndicatorSet, Interpretation, RsiCondition, Signal};
use crate::db::sqlite::models::{Alert, AlertKind, AlertQuery, Anomaly, AnomalyKind, Severity};
use crate::db::sqlite::SqliteDb;
use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const ANOMALY_BUCKET_SECS: i64 = 60;
const INDICATOR_BUCKET_SECS: i64 = 3600;

/// How long a sent key is remembered
fn recent_retention() -> Duration {
    Duration::hours(1)
}

pub struct AlertService {
    sqlite: Arc<SqliteDb>,
    strong_signal_threshold: f64,
    /// Dedup key -> time the alert was sent
    recent: Mutex<HashMap<String, DateTime<Utc>>>,
}

/// Kind and severity for an anomaly. Moves of at least twice the anomaly
/// threshold are high severity.
pub fn classify_anomaly(anomaly: &Anomaly) -> (AlertKind, Severity) {
    let rising = anomaly.percentage_change >= 0.0;
    let high = anomaly.percentage_change.abs() >= 2.0 * anomaly.threshold_pct;

    let kind = match (anomaly.kind, rising, high) {
        (AnomalyKind::Price, true, false) => AlertKind::PriceIncrease,
        (AnomalyKind::Price, false, false) => AlertKind::PriceDecrease,
        (AnomalyKind::Price, true, true) => AlertKind::PriceSurge,
        (AnomalyKind::Price, false, true) => AlertKind::PriceDrop,
        (AnomalyKind::Volume, true, false) => AlertKind::VolumeIncrease,
        (AnomalyKind::Volume, false, false) => AlertKind::VolumeDecrease,
        (AnomalyKind::Volume, true, true) => AlertKind::VolumeSpike,
        (AnomalyKind::Volume, false, true) => AlertKind::VolumeDrop,
    };
    let severity = if high { Severity::High } else { Severity::Medium };
    (kind, severity)
}

fn dedup_key(asset_id: &str, kind: AlertKind, now: DateTime<Utc>, bucket_secs: i64) -> String {
    format!("{}:{}:{}", asset_id, kind, now.timestamp().div_euclid(bucket_secs))
}

impl AlertService {
    pub fn new(sqlite: Arc<SqliteDb>, strong_signal_threshold: f64) -> Self {
        Self {
            sqlite,
            strong_signal_threshold,
            recent: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_anomaly(&self, anomaly: &Anomaly) -> Result<Option<Alert>> {
        self.from_anomaly_at(anomaly, Utc::now())
    }

    /// Alert for an anomaly observed at `now`; `None` if deduplicated
    pub fn from_anomaly_at(&self, anomaly: &Anomaly, now: DateTime<Utc>) -> Result<Option<Alert>> {
        let (kind, severity) = classify_anomaly(anomaly);
        let direction = if anomaly.percentage_change >= 0.0 { "up" } else { "down" };
        let message = format!(
            "{} {} {} {:.2}% ({} -> {})",
            anomaly.asset_id,
            anomaly.kind.as_str(),
            direction,
            anomaly.percentage_change.abs(),
            anomaly.old_value,
            anomaly.new_value
        );

        let alert = Alert {
            id: Uuid::new_v4(),
            asset_id: anomaly.asset_id.clone(),
            kind,
            old_value: Some(anomaly.old_value),
            new_value: Some(anomaly.new_value),
            percentage_change: Some(anomaly.percentage_change),
            message,
            severity,
            timestamp: now,
        };

        self.emit(alert, ANOMALY_BUCKET_SECS, now)
    }

    pub fn from_indicator_signal(
        &self,
        asset_id: &str,
        indicators: &IndicatorSet,
        interpretation: &Interpretation,
    ) -> Result<Vec<Alert>> {
        self.from_indicator_signal_at(asset_id, indicators, interpretation, Utc::now())
    }

    /// Alerts for RSI extremes, MACD crossovers and strong combined signals
    pub fn from_indicator_signal_at(
        &self,
        asset_id: &str,
        indicators: &IndicatorSet,
        interpretation: &Interpretation,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>> {
        let mut candidates: Vec<(AlertKind, Severity, Option<f64>, String)> = Vec::new();

        if let Some(rsi) = &indicators.rsi {
            match rsi.condition {
                RsiCondition::Overbought => candidates.push((
                    AlertKind::RsiOverbought,
                    Severity::Medium,
                    Some(rsi.value),
                    format!("{} RSI({}) overbought at {:.2}", asset_id, rsi.period, rsi.value),
                )),
                RsiCondition::Oversold => candidates.push((
                    AlertKind::RsiOversold,
                    Severity::Medium,
                    Some(rsi.value),
                    format!("{} RSI({}) oversold at {:.2}", asset_id, rsi.period, rsi.value),
                )),
                RsiCondition::Neutral => {}
            }
        }

        if let Some(macd) = &indicators.macd {
            match macd.crossover {
                Some(Signal::Buy) => candidates.push((
                    AlertKind::MacdBullishCrossover,
                    Severity::Medium,
                    Some(macd.macd),
                    format!("{} MACD crossed above its signal line", asset_id),
                )),
                Some(Signal::Sell) => candidates.push((
                    AlertKind::MacdBearishCrossover,
                    Severity::Medium,
                    Some(macd.macd),
                    format!("{} MACD crossed below its signal line", asset_id),
                )),
                _ => {}
            }
        }

        if interpretation.strength >= self.strong_signal_threshold {
            let strong = match interpretation.signal {
                Signal::Buy => Some((AlertKind::StrongBuySignal, "buy")),
                Signal::Sell => Some((AlertKind::StrongSellSignal, "sell")),
                Signal::Neutral => None,
            };
            if let Some((kind, label)) = strong {
                candidates.push((
                    kind,
                    Severity::High,
                    Some(interpretation.strength),
                    format!(
                        "{} strong {} signal ({:.0}% of indicators agree)",
                        asset_id,
                        label,
                        interpretation.strength * 100.0
                    ),
                ));
            }
        }

        let mut alerts = Vec::new();
        for (kind, severity, value, message) in candidates {
            let alert = Alert {
                id: Uuid::new_v4(),
                asset_id: asset_id.to_string(),
                kind,
                old_value: None,
                new_value: value,
                percentage_change: None,
                message,
                severity,
                timestamp: now,
            };
            if let Some(alert) = self.emit(alert, INDICATOR_BUCKET_SECS, now)? {
                alerts.push(alert);
            }
        }
        Ok(alerts)
    }

    /// Claim the dedup key, then persist. A failed write releases the key
    /// so the alert can fire again.
    fn emit(&self, alert: Alert, bucket_secs: i64, now: DateTime<Utc>) -> Result<Option<Alert>> {
        let key = dedup_key(&alert.asset_id, alert.kind, now, bucket_secs);
        if !self.claim(&key, now) {
            debug!("Dropping duplicate alert {}", key);
            return Ok(None);
        }

        if let Err(e) = self.sqlite.insert_alert(&alert) {
            self.recent.lock().remove(&key);
            return Err(AppError::Persistence(format!(
                "failed to store {} alert for {}: {}",
                alert.kind, alert.asset_id, e
            )));
        }

        info!("Alert [{}] {}", alert.severity.as_str(), alert.message);
        Ok(Some(alert))
    }

    fn claim(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut recent = self.recent.lock();
        if recent.contains_key(key) {
            return false;
        }
        recent.retain(|_, sent| now - *sent < recent_retention());
        recent.insert(key.to_string(), now);
        true
    }

    /// Dedup keys currently remembered
    pub fn recent_keys(&self) -> usize {
        self.recent.lock().len()
    }

    pub fn query(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        self.sqlite.query_alerts(query)
    }

    pub fn recent_alerts(&self, limit: u32) -> Result<Vec<Alert>> {
        self.sqlite.query_alerts(&AlertQuery {
            limit: Some(limit),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::indicators::{MacdValue, RsiValue};
    use chrono::TimeZone;

    fn service() -> AlertService {
        AlertService::new(Arc::new(SqliteDb::open_in_memory().unwrap()), 0.7)
    }

    fn anomaly(kind: AnomalyKind, pct: f64, threshold: f64) -> Anomaly {
        Anomaly {
            asset_id: "bitcoin".into(),
            kind,
            old_value: 100.0,
            new_value: 100.0 * (1.0 + pct / 100.0),
            percentage_change: pct,
            threshold_pct: threshold,
            description: String::new(),
            timestamp: Utc::now(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 - 1_700_000_000 % 60 + secs, 0).unwrap()
    }

    #[test]
    fn test_classification_doubling_rule() {
        let cases = [
            (AnomalyKind::Price, 6.0, AlertKind::PriceIncrease, Severity::Medium),
            (AnomalyKind::Price, -7.0, AlertKind::PriceDecrease, Severity::Medium),
            (AnomalyKind::Price, 10.0, AlertKind::PriceSurge, Severity::High),
            (AnomalyKind::Price, -12.0, AlertKind::PriceDrop, Severity::High),
        ];
        for (kind, pct, expected_kind, expected_severity) in cases {
            assert_eq!(
                classify_anomaly(&anomaly(kind, pct, 5.0)),
                (expected_kind, expected_severity),
                "{}%",
                pct
            );
        }

        let volume = [
            (25.0, AlertKind::VolumeIncrease, Severity::Medium),
            (-30.0, AlertKind::VolumeDecrease, Severity::Medium),
            (40.0, AlertKind::VolumeSpike, Severity::High),
            (-45.0, AlertKind::VolumeDrop, Severity::High),
        ];
        for (pct, expected_kind, expected_severity) in volume {
            assert_eq!(
                classify_anomaly(&anomaly(AnomalyKind::Volume, pct, 20.0)),
                (expected_kind, expected_severity)
            );
        }
    }

    #[test]
    fn test_same_minute_bucket_yields_one_alert() {
        let alerts = service();

        let first = alerts.from_anomaly_at(&anomaly(AnomalyKind::Price, 6.0, 5.0), at(5)).unwrap();
        let second = alerts.from_anomaly_at(&anomaly(AnomalyKind::Price, 7.0, 5.0), at(40)).unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(alerts.recent_alerts(10).unwrap().len(), 1);
    }

    #[test]
    fn test_next_bucket_or_other_kind_fires_again() {
        let alerts = service();

        alerts.from_anomaly_at(&anomaly(AnomalyKind::Price, 6.0, 5.0), at(5)).unwrap();
        let other_kind = alerts.from_anomaly_at(&anomaly(AnomalyKind::Price, -6.0, 5.0), at(10)).unwrap();
        let next_minute = alerts.from_anomaly_at(&anomaly(AnomalyKind::Price, 6.0, 5.0), at(65)).unwrap();

        assert_eq!(other_kind.unwrap().kind, AlertKind::PriceDecrease);
        assert!(next_minute.is_some());
        assert_eq!(alerts.recent_alerts(10).unwrap().len(), 3);
    }

    #[test]
    fn test_recent_set_pruned_after_an_hour() {
        let alerts = service();
        alerts.from_anomaly_at(&anomaly(AnomalyKind::Price, 6.0, 5.0), at(0)).unwrap();
        alerts.from_anomaly_at(&anomaly(AnomalyKind::Volume, 30.0, 20.0), at(0)).unwrap();
        assert_eq!(alerts.recent_keys(), 2);

        alerts.from_anomaly_at(&anomaly(AnomalyKind::Price, -6.0, 5.0), at(3600)).unwrap();
        assert_eq!(alerts.recent_keys(), 1);
    }

    #[test]
    fn test_indicator_alerts_and_hourly_dedup() {
        let alerts = service();
        let indicators = IndicatorSet {
            sma: vec![],
            rsi: Some(RsiValue {
                period: 14,
                value: 82.0,
                condition: RsiCondition::Overbought,
            }),
            macd: Some(MacdValue {
                fast: 12,
                slow: 26,
                signal_period: 9,
                macd: -0.4,
                signal: Some(-0.1),
                histogram: Some(-0.3),
                crossover: Some(Signal::Sell),
            }),
        };
        let interpretation = Interpretation {
            signal: Signal::Sell,
            strength: 1.0,
            buy_votes: 0,
            sell_votes: 2,
            neutral_votes: 0,
        };

        let fired = alerts
            .from_indicator_signal_at("bitcoin", &indicators, &interpretation, at(0))
            .unwrap();
        let kinds: Vec<(AlertKind, Severity)> = fired.iter().map(|a| (a.kind, a.severity)).collect();
        assert_eq!(
            kinds,
            vec![
                (AlertKind::RsiOverbought, Severity::Medium),
                (AlertKind::MacdBearishCrossover, Severity::Medium),
                (AlertKind::StrongSellSignal, Severity::High),
            ]
        );

        // Same hour: everything deduplicated
        let again = alerts
            .from_indicator_signal_at("bitcoin", &indicators, &interpretation, at(1800))
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_weak_or_neutral_signal_not_strong() {
        let alerts = service();
        let weak = Interpretation {
            signal: Signal::Buy,
            strength: 0.5,
            buy_votes: 1,
            sell_votes: 0,
            neutral_votes: 1,
        };
        let fired = alerts
            .from_indicator_signal_at("bitcoin", &IndicatorSet::default(), &weak, at(0))
            .unwrap();
        assert!(fired.is_empty());
    }
}
