//! Holt double exponential smoothing (level + trend)

use super::Predictor;
use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Holt {
    pub level: f64,
    pub trend: f64,
}

impl Holt {
    pub fn fit(series: &[f64], alpha: f64, beta: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) || !(beta > 0.0 && beta <= 1.0) {
            return Err(AppError::Model(format!(
                "smoothing factors must be in (0, 1], got alpha={} beta={}",
                alpha, beta
            )));
        }
        if series.len() < 2 {
            return Err(AppError::Model(format!("Holt smoothing needs 2 points, got {}", series.len())));
        }

        let mut level = series[0];
        let mut trend = series[1] - series[0];
        for value in &series[1..] {
            let prev_level = level;
            level = alpha * value + (1.0 - alpha) * (level + trend);
            trend = beta * (level - prev_level) + (1.0 - beta) * trend;
        }

        if !level.is_finite() || !trend.is_finite() {
            return Err(AppError::Model("Holt smoothing diverged".into()));
        }
        Ok(Self { level, trend })
    }
}

impl Predictor for Holt {
    fn name(&self) -> &'static str {
        "holt"
    }

    fn predict(&self, steps: usize) -> Result<Vec<f64>> {
        Ok((1..=steps).map(|k| self.level + k as f64 * self.trend).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_series_stays_flat() {
        let model = Holt::fit(&[100.0; 30], 0.5, 0.3).unwrap();
        assert_eq!(model.predict(3).unwrap(), vec![100.0, 100.0, 100.0]);
    }

    #[test]
    fn test_tracks_linear_trend() {
        let series: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let model = Holt::fit(&series, 0.5, 0.3).unwrap();
        let next = model.predict(1).unwrap();
        assert!((next[0] - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_bad_factors() {
        assert!(Holt::fit(&[1.0, 2.0], 0.0, 0.3).is_err());
        assert!(Holt::fit(&[1.0, 2.0], 0.5, 1.5).is_err());
    }
}
