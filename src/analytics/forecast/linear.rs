//! Ordinary least squares of price on time index

use super::Predictor;
use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct LinearRegression {
    pub slope: f64,
    pub intercept: f64,
    len: usize,
}

impl LinearRegression {
    pub fn fit(series: &[f64]) -> Result<Self> {
        let n = series.len();
        if n < 2 {
            return Err(AppError::Model(format!("linear regression needs 2 points, got {}", n)));
        }

        let nf = n as f64;
        let mean_x = (nf - 1.0) / 2.0;
        let mean_y = series.iter().sum::<f64>() / nf;

        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (i, y) in series.iter().enumerate() {
            let dx = i as f64 - mean_x;
            sxy += dx * (y - mean_y);
            sxx += dx * dx;
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        if !slope.is_finite() || !intercept.is_finite() {
            return Err(AppError::Model("linear regression produced non-finite coefficients".into()));
        }

        Ok(Self {
            slope,
            intercept,
            len: n,
        })
    }
}

impl Predictor for LinearRegression {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn predict(&self, steps: usize) -> Result<Vec<f64>> {
        let last = self.len as f64 - 1.0;
        Ok((1..=steps)
            .map(|k| self.intercept + self.slope * (last + k as f64))
            .collect())
    }
}
