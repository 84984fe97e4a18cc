//! Forecast Service
//!
//! Trains and caches one ensemble model per asset. Stored history is
//! collapsed to daily closes before training, and a cached model is reused
//! until it is older than the staleness window.

use crate::analytics::forecast::{self, synthetic, EnsembleModel, Forecast, ForecastBasis};
use crate::broadcast::{Broadcaster, MarketEvent};
use crate::config::ForecastConfig;
use crate::db::duckdb::DuckDb;
use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// History window read for training (days)
const TRAINING_DAYS: i64 = 180;

/// Length of a synthetic training series
const SYNTHETIC_POINTS: usize = 30;

pub struct ForecastService {
    duckdb: Arc<DuckDb>,
    config: ForecastConfig,
    models: DashMap<String, Arc<EnsembleModel>>,
    events: Broadcaster,
}

impl ForecastService {
    pub fn new(duckdb: Arc<DuckDb>, config: ForecastConfig, events: Broadcaster) -> Self {
        Self {
            duckdb,
            config,
            models: DashMap::new(),
            events,
        }
    }

    fn staleness(&self) -> Duration {
        Duration::seconds(self.config.staleness_secs as i64)
    }

    pub fn forecast(&self, asset_id: &str) -> Result<Forecast> {
        self.forecast_at(asset_id, Utc::now())
    }

    /// Forecast from the cached model, training first if it is missing or stale
    pub fn forecast_at(&self, asset_id: &str, now: DateTime<Utc>) -> Result<Forecast> {
        let cached = self
            .models
            .get(asset_id)
            .map(|entry| entry.value().clone())
            .filter(|model| !model.is_stale(now, self.staleness()));

        let model = match cached {
            Some(model) => {
                debug!("Using cached forecast model for {}", asset_id);
                model
            }
            None => self.train_at(asset_id, now)?,
        };

        Ok(self.publish(&model, now))
    }

    /// Train a model for `asset_id` on daily closes and cache it. Short
    /// histories are padded with a synthetic walk and the model is marked
    /// accordingly.
    pub fn train_at(&self, asset_id: &str, now: DateTime<Utc>) -> Result<Arc<EnsembleModel>> {
        let from = now - Duration::days(TRAINING_DAYS);
        let history = self.duckdb.price_history(asset_id, from, now)?;
        let series: Vec<(DateTime<Utc>, f64)> =
            history.iter().map(|p| (p.timestamp, p.price)).collect();
        let daily = forecast::daily_closes(&series);

        let (last_timestamp, last_price) = *daily
            .last()
            .ok_or_else(|| AppError::NotFound(format!("no price history for {}", asset_id)))?;

        let observed: Vec<f64> = daily.iter().map(|(_, price)| *price).collect();
        let (prices, basis) = if observed.len() < self.config.min_history {
            warn!(
                "Only {} daily points for {}, training on a synthetic series",
                observed.len(),
                asset_id
            );
            let len = SYNTHETIC_POINTS.max(self.config.min_history);
            let series = synthetic::backfill(&observed, last_price, len, synthetic::seed_for(asset_id));
            (series, ForecastBasis::Synthetic)
        } else {
            (observed, ForecastBasis::Observed)
        };

        let model = Arc::new(forecast::train(
            asset_id,
            &prices,
            last_timestamp,
            basis,
            &self.config,
            now,
        )?);
        info!(
            "Trained forecast model for {} on {} daily points ({:?})",
            asset_id, model.training_points, basis
        );

        self.models.insert(asset_id.to_string(), model.clone());
        Ok(model)
    }

    fn publish(&self, model: &EnsembleModel, now: DateTime<Utc>) -> Forecast {
        let forecast = model.forecast(self.config.horizon_days, self.config.band_pct, now);
        self.events.publish(MarketEvent::ForecastUpdate(forecast.clone()));
        forecast
    }

    pub fn invalidate(&self, asset_id: &str) {
        self.models.remove(asset_id);
    }

    pub fn cached_models(&self) -> usize {
        self.models.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::duckdb::models::PricePoint;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

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
                timestamp: now() - Duration::days(n - i as i64),
            })
            .collect();
        duckdb.append_price_points(&points).unwrap();
    }

    fn setup() -> (Arc<DuckDb>, Broadcaster, ForecastService) {
        let duckdb = Arc::new(DuckDb::open_in_memory().unwrap());
        let events = Broadcaster::default();
        let service = ForecastService::new(duckdb.clone(), ForecastConfig::default(), events.clone());
        (duckdb, events, service)
    }

    #[test]
    fn test_constant_history_forecasts_flat() {
        let (duckdb, events, service) = setup();
        let mut rx = events.subscribe();
        seed(&duckdb, "tether", &[100.0; 30]);

        let forecast = service.forecast_at("tether", now()).unwrap();

        assert_eq!(forecast.basis, ForecastBasis::Observed);
        assert_eq!(forecast.points.len(), 7);
        for point in &forecast.points {
            assert!((point.price - 100.0).abs() < 1e-9);
        }
        assert_eq!(rx.try_recv().unwrap().name(), "forecastUpdate");
    }

    #[test]
    fn test_short_history_is_marked_synthetic() {
        let (duckdb, _, service) = setup();
        seed(&duckdb, "newcoin", &[5.0, 5.1, 5.2]);

        let forecast = service.forecast_at("newcoin", now()).unwrap();
        assert_eq!(forecast.basis, ForecastBasis::Synthetic);
        assert_eq!(forecast.points.len(), 7);
        assert!(forecast.points.iter().all(|p| p.price >= 0.0));
    }

    #[test]
    fn test_no_history_is_not_found() {
        let (_, _, service) = setup();
        assert!(matches!(
            service.forecast_at("ghost", now()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_model_cached_until_stale() {
        let (duckdb, _, service) = setup();
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.5).sin() * 5.0).collect();
        seed(&duckdb, "bitcoin", &prices);

        let first = service.forecast_at("bitcoin", now()).unwrap();
        let cached = service.forecast_at("bitcoin", now() + Duration::hours(6)).unwrap();
        assert_eq!(cached.trained_at, first.trained_at);
        assert_eq!(service.cached_models(), 1);

        let later = now() + Duration::hours(13);
        let retrained = service.forecast_at("bitcoin", later).unwrap();
        assert_eq!(retrained.trained_at, later);
    }

    #[test]
    fn test_minute_snapshots_do_not_flatten_daily_trend() {
        let (duckdb, _, service) = setup();
        // 30 daily closes rising 1.0 per day, the last at Feb 29 00:00
        seed(&duckdb, "bitcoin", &(0..30).map(|i| 100.0 + i as f64).collect::<Vec<_>>());

        // Three hours of one-minute snapshots late on Feb 29 continuing the trend
        let day = now() - Duration::days(1);
        let mut points = Vec::new();
        for j in 0..180i64 {
            let minute = 21 * 60 + j;
            points.push(PricePoint {
                asset_id: "bitcoin".into(),
                price: 129.0 + minute as f64 / 1440.0,
                market_cap: None,
                volume: None,
                timestamp: day + Duration::minutes(minute),
            });
        }
        duckdb.append_price_points(&points).unwrap();
        let last_sample = day + Duration::minutes(21 * 60 + 179);

        let model = service.train_at("bitcoin", now()).unwrap();
        assert_eq!(model.training_points, 30);
        assert_eq!(model.basis, ForecastBasis::Observed);

        let forecast = service.forecast_at("bitcoin", now()).unwrap();
        assert_eq!(forecast.points[0].timestamp, last_sample + Duration::days(1));
        assert!(forecast.points.windows(2).all(|w| w[1].price > w[0].price));
        let week_gain = forecast.points[6].price - forecast.points[0].price;
        assert!(week_gain > 4.0 && week_gain < 12.0, "gain over six days: {}", week_gain);
    }
}
