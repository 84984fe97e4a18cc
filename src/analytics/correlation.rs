//! Pairwise Pearson correlation over timestamp-aligned price series

use crate::db::sqlite::models::CorrelationEdge;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Price series keyed by epoch-millisecond timestamps, oldest first
pub type TimedSeries = Vec<(i64, f64)>;

/// Pair each point of `a` with the nearest unused point of `b` no more than
/// `tolerance_ms` away. A tolerance of 0 pairs exact timestamps only.
pub fn align(a: &[(i64, f64)], b: &[(i64, f64)], tolerance_ms: i64) -> Vec<(f64, f64)> {
    let mut pairs = Vec::new();
    let mut j = 0;

    for &(ts, value) in a {
        while j + 1 < b.len() && (b[j + 1].0 - ts).abs() <= (b[j].0 - ts).abs() {
            j += 1;
        }
        if j < b.len() && (b[j].0 - ts).abs() <= tolerance_ms {
            pairs.push((value, b[j].1));
            j += 1;
        }
    }

    pairs
}

/// Pearson coefficient rounded to 4 places; 0 when undefined
pub fn pearson(pairs: &[(f64, f64)]) -> f64 {
    if pairs.len() < 2 {
        return 0.0;
    }
    let (first_x, first_y) = pairs[0];
    if pairs.iter().all(|(x, _)| *x == first_x) || pairs.iter().all(|(_, y)| *y == first_y) {
        return 0.0;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    let r = (cov / denom).clamp(-1.0, 1.0);
    (r * 10_000.0).round() / 10_000.0
}

/// Symmetric correlation matrix with unit diagonal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub asset_ids: Vec<String>,
    pub values: Vec<Vec<f64>>,
    pub timeframe: String,
    pub timestamp: DateTime<Utc>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.asset_ids.iter().position(|id| id == a)?;
        let j = self.asset_ids.iter().position(|id| id == b)?;
        Some(self.values[i][j])
    }

    /// One edge per unordered pair, smaller id first
    pub fn edges(&self) -> Vec<CorrelationEdge> {
        let mut edges = Vec::new();
        for i in 0..self.asset_ids.len() {
            for j in (i + 1)..self.asset_ids.len() {
                let (a, b) = (&self.asset_ids[i], &self.asset_ids[j]);
                if a == b {
                    continue;
                }
                let (asset_a, asset_b) = if a < b { (a, b) } else { (b, a) };
                edges.push(CorrelationEdge {
                    asset_a: asset_a.clone(),
                    asset_b: asset_b.clone(),
                    value: self.values[i][j],
                    timeframe: self.timeframe.clone(),
                    timestamp: self.timestamp,
                });
            }
        }
        edges
    }
}

/// Build the matrix for every pair of the given series
pub fn correlation_matrix(
    series: &[(String, TimedSeries)],
    tolerance_ms: i64,
    timeframe: &str,
    timestamp: DateTime<Utc>,
) -> CorrelationMatrix {
    let n = series.len();
    let mut values = vec![vec![0.0; n]; n];

    for i in 0..n {
        values[i][i] = 1.0;
        for j in (i + 1)..n {
            let pairs = align(&series[i].1, &series[j].1, tolerance_ms);
            let r = pearson(&pairs);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix {
        asset_ids: series.iter().map(|(id, _)| id.clone()).collect(),
        values,
        timeframe: timeframe.to_string(),
        timestamp,
    }
}
