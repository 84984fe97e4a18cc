//! AR(p) on the normalized series, fit by ridge-regularized least squares

use super::Predictor;
use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Autoregressive {
    pub coefficients: Vec<f64>,
    mean: f64,
    std: f64,
    /// Last `p` normalized values, oldest first
    lags: Vec<f64>,
}

impl Autoregressive {
    pub fn fit(series: &[f64], order: usize, ridge_lambda: f64) -> Result<Self> {
        let n = series.len();
        if order == 0 {
            return Err(AppError::Model("autoregression order must be positive".into()));
        }
        if n < 2 * order {
            return Err(AppError::Model(format!(
                "AR({}) needs at least {} points, got {}",
                order,
                2 * order,
                n
            )));
        }

        let mean = series.iter().sum::<f64>() / n as f64;
        let variance = series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let std = variance.sqrt();
        if !(std > 1e-12 * mean.abs().max(1.0)) {
            return Err(AppError::Model("series has no variance".into()));
        }
        let z: Vec<f64> = series.iter().map(|v| (v - mean) / std).collect();

        // Normal equations (X^T X + lambda I) w = X^T y, row t = [z[t-1], .., z[t-p]]
        let mut xtx = vec![vec![0.0; order]; order];
        let mut xty = vec![0.0; order];
        for t in order..n {
            for i in 0..order {
                let xi = z[t - 1 - i];
                xty[i] += xi * z[t];
                for j in 0..order {
                    xtx[i][j] += xi * z[t - 1 - j];
                }
            }
        }
        for (i, row) in xtx.iter_mut().enumerate() {
            row[i] += ridge_lambda;
        }

        let coefficients = solve(xtx, xty)?;
        Ok(Self {
            coefficients,
            mean,
            std,
            lags: z[n - order..].to_vec(),
        })
    }
}

/// Gaussian elimination with partial pivoting
pub fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(AppError::Model("singular system".into()));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

impl Predictor for Autoregressive {
    fn name(&self) -> &'static str {
        "autoregressive"
    }

    fn predict(&self, steps: usize) -> Result<Vec<f64>> {
        let mut lags = self.lags.clone();
        let mut out = Vec::with_capacity(steps);

        for _ in 0..steps {
            let next: f64 = self
                .coefficients
                .iter()
                .enumerate()
                .map(|(i, c)| c * lags[lags.len() - 1 - i])
                .sum();
            if !next.is_finite() {
                return Err(AppError::Model("autoregression diverged".into()));
            }
            lags.remove(0);
            lags.push(next);
            out.push(next * self.std + self.mean);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_with_pivoting() {
        // First pivot is zero without row swap
        let a = vec![vec![0.0, 1.0], vec![2.0, 1.0]];
        let x = solve(a, vec![3.0, 5.0]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_system_fails() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve(a, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_constant_series_is_degenerate() {
        assert!(matches!(
            Autoregressive::fit(&[100.0; 30], 3, 1e-6),
            Err(AppError::Model(_))
        ));
    }

    #[test]
    fn test_learns_sinusoid_recurrence() {
        // A sampled sine obeys x[t] = 2cos(w) x[t-1] - x[t-2]
        let wave = |t: usize| 100.0 + 10.0 * (0.3 * t as f64).sin();
        let series: Vec<f64> = (0..60).map(wave).collect();

        let model = Autoregressive::fit(&series, 2, 1e-6).unwrap();
        assert!((model.coefficients[0] - 2.0 * 0.3f64.cos()).abs() < 0.05);
        assert!((model.coefficients[1] + 1.0).abs() < 0.05);

        let forecast = model.predict(3).unwrap();
        for (k, predicted) in forecast.iter().enumerate() {
            assert!((predicted - wave(60 + k)).abs() < 0.5, "step {}: {}", k, predicted);
        }
    }

    #[test]
    fn test_short_series_fails() {
        assert!(Autoregressive::fit(&[1.0, 2.0, 3.0], 3, 1e-6).is_err());
    }
}
