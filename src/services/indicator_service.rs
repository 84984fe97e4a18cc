//! Indicator Service
//!
//! Reads an asset's price window from DuckDB, computes the indicator set,
//! persists current values and raises indicator alerts.

use crate::analytics::indicators::{self, IndicatorSet, Interpretation};
use crate::broadcast::{Broadcaster, MarketEvent};
use crate::config::IndicatorConfig;
use crate::db::duckdb::DuckDb;
use crate::db::sqlite::models::{Alert, IndicatorKind, IndicatorValue};
use crate::db::sqlite::SqliteDb;
use crate::error::Result;
use crate::services::alert_service::AlertService;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Indicator calculation result
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorReport {
    pub asset_id: String,
    pub indicators: IndicatorSet,
    pub interpretation: Interpretation,
    /// Price points the calculation read
    pub points: usize,
    pub alerts: Vec<Alert>,
    pub calculated_at: DateTime<Utc>,
}

pub struct IndicatorService {
    sqlite: Arc<SqliteDb>,
    duckdb: Arc<DuckDb>,
    config: IndicatorConfig,
    alerts: Arc<AlertService>,
    events: Broadcaster,
}

impl IndicatorService {
    pub fn new(
        sqlite: Arc<SqliteDb>,
        duckdb: Arc<DuckDb>,
        config: IndicatorConfig,
        alerts: Arc<AlertService>,
        events: Broadcaster,
    ) -> Self {
        Self {
            sqlite,
            duckdb,
            config,
            alerts,
            events,
        }
    }

    pub fn calculate(&self, asset_id: &str, window_days: u32) -> Result<IndicatorReport> {
        self.calculate_at(asset_id, window_days, Utc::now())
    }

    /// Compute indicators over the `window_days` ending at `now`
    pub fn calculate_at(
        &self,
        asset_id: &str,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<IndicatorReport> {
        let from = now - Duration::days(window_days as i64);
        let history = self.duckdb.price_history(asset_id, from, now)?;
        let prices: Vec<f64> = history.iter().map(|p| p.price).collect();

        let set = indicators::compute(&prices, &self.config);
        let interpretation = indicators::interpret(&set, &self.config);

        if set.is_empty() {
            debug!("Not enough history for indicators on {} ({} points)", asset_id, prices.len());
            return Ok(IndicatorReport {
                asset_id: asset_id.to_string(),
                indicators: set,
                interpretation,
                points: prices.len(),
                alerts: Vec::new(),
                calculated_at: now,
            });
        }

        self.sqlite.insert_indicator_values(&set.to_values(asset_id, now))?;

        self.events.publish(MarketEvent::TechnicalIndicatorsUpdate {
            asset_id: asset_id.to_string(),
            indicators: set.clone(),
            interpretation: interpretation.clone(),
        });

        let alerts = match self
            .alerts
            .from_indicator_signal_at(asset_id, &set, &interpretation, now)
        {
            Ok(alerts) => alerts,
            Err(e) => {
                error!("Failed to raise indicator alerts for {}: {}", asset_id, e);
                Vec::new()
            }
        };
        if !alerts.is_empty() {
            self.events.publish(MarketEvent::NewAlerts(alerts.clone()));
        }

        info!(
            "Indicators for {}: {:?} (strength {:.2}) from {} points",
            asset_id,
            interpretation.signal,
            interpretation.strength,
            prices.len()
        );

        Ok(IndicatorReport {
            asset_id: asset_id.to_string(),
            indicators: set,
            interpretation,
            points: prices.len(),
            alerts,
            calculated_at: now,
        })
    }

    pub fn latest(&self, asset_id: &str) -> Result<Vec<IndicatorValue>> {
        self.sqlite.latest_indicator_values(asset_id)
    }

    pub fn history(
        &self,
        asset_id: &str,
        kind: Option<IndicatorKind>,
        limit: i64,
    ) -> Result<Vec<IndicatorValue>> {
        self.sqlite.get_indicator_values(asset_id, kind, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::indicators::RsiCondition;
    use crate::db::duckdb::models::PricePoint;
    use crate::db::sqlite::models::AlertKind;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn setup() -> (Arc<SqliteDb>, Arc<DuckDb>, Broadcaster, IndicatorService) {
        let sqlite = Arc::new(SqliteDb::open_in_memory().unwrap());
        let duckdb = Arc::new(DuckDb::open_in_memory().unwrap());
        let events = Broadcaster::default();
        let alerts = Arc::new(AlertService::new(sqlite.clone(), 0.7));
        let service = IndicatorService::new(
            sqlite.clone(),
            duckdb.clone(),
            IndicatorConfig::default(),
            alerts,
            events.clone(),
        );
        (sqlite, duckdb, events, service)
    }

    /// Daily points ending at `now()`
    fn seed(duckdb: &DuckDb, asset_id: &str, prices: &[f64]) {
        let n = prices.len() as i64;
        let points: Vec<PricePoint> = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint {
                asset_id: asset_id.to_string(),
                price,
                market_cap: None,
                volume: None,
                timestamp: now() - Duration::days(n - 1 - i as i64),
            })
            .collect();
        duckdb.append_price_points(&points).unwrap();
    }

    #[test]
    fn test_rising_series() {
        let (sqlite, duckdb, events, service) = setup();
        let mut rx = events.subscribe();
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        seed(&duckdb, "bitcoin", &prices);

        let report = service.calculate_at("bitcoin", 30, now()).unwrap();

        assert_eq!(report.points, 30);
        let periods: Vec<usize> = report.indicators.sma.iter().map(|s| s.period).collect();
        assert_eq!(periods, vec![7, 25]);
        let rsi = report.indicators.rsi.as_ref().unwrap();
        assert_eq!(rsi.value, 100.0);
        assert_eq!(rsi.condition, RsiCondition::Overbought);
        assert!(report.indicators.macd.is_some());

        assert!(report.alerts.iter().any(|a| a.kind == AlertKind::RsiOverbought));

        let stored = sqlite.latest_indicator_values("bitcoin").unwrap();
        assert!(stored.iter().any(|v| v.kind() == IndicatorKind::Rsi));
        assert_eq!(stored.len(), report.indicators.to_values("bitcoin", now()).len());

        assert_eq!(rx.try_recv().unwrap().name(), "technicalIndicatorsUpdate");
    }

    #[test]
    fn test_window_excludes_older_points() {
        let (_, duckdb, _, service) = setup();
        let prices: Vec<f64> = (0..40).map(|i| 50.0 + (i % 5) as f64).collect();
        seed(&duckdb, "ethereum", &prices);

        let report = service.calculate_at("ethereum", 10, now()).unwrap();
        assert_eq!(report.points, 11);
        assert!(report.indicators.rsi.is_none());
    }

    #[test]
    fn test_no_history_persists_nothing() {
        let (sqlite, _, events, service) = setup();
        let mut rx = events.subscribe();

        let report = service.calculate_at("unknown", 30, now()).unwrap();
        assert!(report.indicators.is_empty());
        assert_eq!(report.interpretation.strength, 0.0);
        assert!(sqlite.latest_indicator_values("unknown").unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }
}
