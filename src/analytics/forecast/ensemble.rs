//! Weighted combination of predictor outputs

/// Move the weight of failed members onto the survivors in equal shares,
/// then normalize so the result sums to 1. All zero when nothing survived.
pub fn redistribute_weights(base: &[f64], ok: &[bool]) -> Vec<f64> {
    let survivors = ok.iter().filter(|s| **s).count();
    if survivors == 0 {
        return vec![0.0; base.len()];
    }

    let failed_weight: f64 = base
        .iter()
        .zip(ok)
        .filter(|(_, ok)| !**ok)
        .map(|(w, _)| *w)
        .sum();
    let share = failed_weight / survivors as f64;

    let mut weights: Vec<f64> = base
        .iter()
        .zip(ok)
        .map(|(w, ok)| if *ok { w + share } else { 0.0 })
        .collect();

    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for w in &mut weights {
            *w /= total;
        }
    } else {
        // Every survivor had zero weight; split evenly
        for (w, ok) in weights.iter_mut().zip(ok) {
            *w = if *ok { 1.0 / survivors as f64 } else { 0.0 };
        }
    }
    weights
}

/// Weighted sum of equally long prediction vectors
pub fn combine(predictions: &[(f64, Vec<f64>)], steps: usize) -> Vec<f64> {
    (0..steps)
        .map(|k| predictions.iter().map(|(w, p)| w * p[k]).sum())
        .collect()
}
