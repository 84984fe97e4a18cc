//! Short-horizon price forecasting
//!
//! Three predictors (linear regression, Holt smoothing, AR(p)) are trained on
//! the same series and combined with fixed weights. A predictor that fails to
//! train or predict hands its weight to the others; if every predictor fails
//! the forecast is a flat line at the last price.

pub mod autoregressive;
pub mod ensemble;
pub mod holt;
pub mod linear;
pub mod synthetic;

use crate::config::ForecastConfig;
use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

pub use autoregressive::Autoregressive;
pub use holt::Holt;
pub use linear::LinearRegression;

/// A trained model that can extrapolate `steps` points past its series
pub trait Predictor: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn predict(&self, steps: usize) -> Result<Vec<f64>>;
}

/// Whether a model was trained on observed prices or on a synthetic backfill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastBasis {
    Observed,
    Synthetic,
}

#[derive(Debug)]
struct Member {
    name: &'static str,
    weight: f64,
    predictor: Option<Box<dyn Predictor>>,
}

/// Trained predictor bundle for one asset
#[derive(Debug)]
pub struct EnsembleModel {
    pub asset_id: String,
    members: Vec<Member>,
    pub last_price: f64,
    pub last_timestamp: DateTime<Utc>,
    pub trained_at: DateTime<Utc>,
    pub training_points: usize,
    pub basis: ForecastBasis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeight {
    pub model: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub asset_id: String,
    pub basis: ForecastBasis,
    pub points: Vec<ForecastPoint>,
    /// Predictors that contributed, with their effective weights.
    /// Empty when the forecast is the flat-line fallback.
    pub weights: Vec<ModelWeight>,
    pub trained_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
}

impl Forecast {
    pub fn is_fallback(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Collapse a time-ordered series to its last observation per UTC day.
/// Forecast steps are one day apart, so training sees one point per day
/// however often the price was sampled.
pub fn daily_closes(series: &[(DateTime<Utc>, f64)]) -> Vec<(DateTime<Utc>, f64)> {
    let mut closes: Vec<(DateTime<Utc>, f64)> = Vec::new();
    for &(timestamp, price) in series {
        match closes.last_mut() {
            Some(last) if last.0.date_naive() == timestamp.date_naive() => {
                *last = (timestamp, price)
            }
            _ => closes.push((timestamp, price)),
        }
    }
    closes
}

/// Train every predictor on `prices` (oldest first, last one observed at
/// `last_timestamp`). Individual predictor failures are logged and recorded.
pub fn train(
    asset_id: &str,
    prices: &[f64],
    last_timestamp: DateTime<Utc>,
    basis: ForecastBasis,
    config: &ForecastConfig,
    trained_at: DateTime<Utc>,
) -> Result<EnsembleModel> {
    let last_price = *prices
        .last()
        .ok_or_else(|| AppError::Model(format!("no prices to train on for {}", asset_id)))?;

    let fitted: [(&'static str, f64, Result<Box<dyn Predictor>>); 3] = [
        (
            "linear",
            config.linear_weight,
            LinearRegression::fit(prices).map(|m| Box::new(m) as Box<dyn Predictor>),
        ),
        (
            "holt",
            config.holt_weight,
            Holt::fit(prices, config.alpha, config.beta).map(|m| Box::new(m) as Box<dyn Predictor>),
        ),
        (
            "autoregressive",
            config.autoregressive_weight,
            Autoregressive::fit(prices, config.ar_order, config.ridge_lambda)
                .map(|m| Box::new(m) as Box<dyn Predictor>),
        ),
    ];

    let members = fitted
        .into_iter()
        .map(|(name, weight, fit)| Member {
            name,
            weight,
            predictor: match fit {
                Ok(predictor) => Some(predictor),
                Err(e) => {
                    warn!("{} predictor failed to train for {}: {}", name, asset_id, e);
                    None
                }
            },
        })
        .collect();

    Ok(EnsembleModel {
        asset_id: asset_id.to_string(),
        members,
        last_price,
        last_timestamp,
        trained_at,
        training_points: prices.len(),
        basis,
    })
}

impl EnsembleModel {
    /// Forecast `horizon` daily points past the last observation
    pub fn forecast(&self, horizon: usize, band_pct: f64, generated_at: DateTime<Utc>) -> Forecast {
        let outputs: Vec<Option<Vec<f64>>> = self
            .members
            .iter()
            .map(|member| {
                let predictor = member.predictor.as_ref()?;
                match predictor.predict(horizon) {
                    Ok(values) if values.len() == horizon && values.iter().all(|v| v.is_finite()) => {
                        Some(values)
                    }
                    Ok(_) => {
                        warn!("{} predictor returned unusable output for {}", member.name, self.asset_id);
                        None
                    }
                    Err(e) => {
                        warn!("{} predictor failed for {}: {}", member.name, self.asset_id, e);
                        None
                    }
                }
            })
            .collect();

        let base: Vec<f64> = self.members.iter().map(|m| m.weight).collect();
        let ok: Vec<bool> = outputs.iter().map(Option::is_some).collect();
        let weights = ensemble::redistribute_weights(&base, &ok);

        let contributions: Vec<(f64, Vec<f64>)> = weights
            .iter()
            .zip(outputs)
            .filter_map(|(w, out)| out.map(|values| (*w, values)))
            .collect();

        let (prices, used) = if contributions.is_empty() {
            warn!("All predictors failed for {}, using flat forecast", self.asset_id);
            (vec![self.last_price; horizon], Vec::new())
        } else {
            let used = self
                .members
                .iter()
                .zip(&weights)
                .zip(&ok)
                .filter(|(_, ok)| **ok)
                .map(|((member, w), _)| ModelWeight {
                    model: member.name.to_string(),
                    weight: *w,
                })
                .collect();
            (ensemble::combine(&contributions, horizon), used)
        };

        let band = band_pct / 100.0;
        let points = prices
            .into_iter()
            .enumerate()
            .map(|(k, price)| {
                let price = price.max(0.0);
                ForecastPoint {
                    timestamp: self.last_timestamp + Duration::days(k as i64 + 1),
                    price,
                    lower: (price * (1.0 - band)).max(0.0),
                    upper: price * (1.0 + band),
                }
            })
            .collect();

        Forecast {
            asset_id: self.asset_id.clone(),
            basis: self.basis,
            points,
            weights: used,
            trained_at: self.trained_at,
            generated_at,
        }
    }

    /// Whether the model is older than `staleness` at `now`
    pub fn is_stale(&self, now: DateTime<Utc>, staleness: Duration) -> bool {
        now - self.trained_at >= staleness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_daily_closes_keep_last_point_per_day() {
        let day = |d: u32, h: u32, m: u32| Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap();
        let series = vec![
            (day(1, 0, 0), 10.0),
            (day(2, 0, 0), 11.0),
            (day(2, 9, 30), 11.5),
            (day(2, 23, 59), 11.9),
            (day(3, 0, 0), 12.0),
        ];

        let closes = daily_closes(&series);
        assert_eq!(
            closes,
            vec![(day(1, 0, 0), 10.0), (day(2, 23, 59), 11.9), (day(3, 0, 0), 12.0)]
        );
        assert!(daily_closes(&[]).is_empty());
    }

    fn model(prices: &[f64]) -> EnsembleModel {
        train(
            "bitcoin",
            prices,
            Utc::now(),
            ForecastBasis::Observed,
            &ForecastConfig::default(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_flat_series_forecasts_flat() {
        let forecast = model(&[100.0; 30]).forecast(7, 10.0, Utc::now());

        assert_eq!(forecast.points.len(), 7);
        for point in &forecast.points {
            assert!((point.price - 100.0).abs() < 1e-9);
            assert!((point.lower - 90.0).abs() < 1e-9);
            assert!((point.upper - 110.0).abs() < 1e-9);
        }
        // AR cannot fit a constant series; its weight moved to the others
        let names: Vec<&str> = forecast.weights.iter().map(|w| w.model.as_str()).collect();
        assert_eq!(names, vec!["linear", "holt"]);
        let total: f64 = forecast.weights.iter().map(|w| w.weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_points_are_daily_after_last_observation() {
        let last = Utc::now();
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.5).sin()).collect();
        let m = train("bitcoin", &prices, last, ForecastBasis::Observed, &ForecastConfig::default(), last).unwrap();
        let forecast = m.forecast(3, 10.0, last);

        for (k, point) in forecast.points.iter().enumerate() {
            assert_eq!(point.timestamp, last + Duration::days(k as i64 + 1));
        }
        assert_eq!(forecast.weights.len(), 3);
    }

    #[test]
    fn test_forecast_floored_at_zero() {
        // Steep decline extrapolates below zero
        let prices: Vec<f64> = (0..20).map(|i| 100.0 - 5.0 * i as f64).collect();
        let forecast = model(&prices).forecast(10, 10.0, Utc::now());
        assert!(forecast.points.iter().all(|p| p.price >= 0.0 && p.lower >= 0.0));
        assert_eq!(forecast.points.last().unwrap().price, 0.0);
    }

    #[test]
    fn test_all_predictors_failing_gives_flat_line() {
        let forecast = model(&[42.0]).forecast(4, 10.0, Utc::now());
        assert!(forecast.is_fallback());
        assert!(forecast.points.iter().all(|p| p.price == 42.0));
    }

    #[test]
    fn test_empty_series_rejected() {
        let result = train("x", &[], Utc::now(), ForecastBasis::Observed, &ForecastConfig::default(), Utc::now());
        assert!(matches!(result, Err(AppError::Model(_))));
    }

    #[test]
    fn test_staleness() {
        let m = model(&[1.0, 2.0, 3.0]);
        assert!(!m.is_stale(m.trained_at + Duration::hours(11), Duration::hours(12)));
        assert!(m.is_stale(m.trained_at + Duration::hours(12), Duration::hours(12)));
    }
}
