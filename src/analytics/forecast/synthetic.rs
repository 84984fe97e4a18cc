//! Synthetic backfill for assets with too little history

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Maximum absolute daily move of the generated walk
const MAX_DAILY_MOVE: f64 = 0.02;

/// Stable seed so repeated training on the same asset is reproducible
pub fn seed_for(asset_id: &str) -> u64 {
    asset_id
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |hash, b| (hash ^ b as u64).wrapping_mul(0x0100_0000_01b3))
}

/// Extend `history` backwards with a bounded random walk so it has `len`
/// points. The walk ends at the first real price (or `anchor` when there is
/// no history), so the real observations stay at the tail untouched.
pub fn backfill(history: &[f64], anchor: f64, len: usize, seed: u64) -> Vec<f64> {
    if history.len() >= len {
        return history.to_vec();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let missing = len - history.len();
    let mut price = history.first().copied().unwrap_or(anchor);

    let mut walk = Vec::with_capacity(missing);
    for _ in 0..missing {
        let change: f64 = rng.gen_range(-MAX_DAILY_MOVE..=MAX_DAILY_MOVE);
        price = (price / (1.0 + change)).max(0.0);
        walk.push(price);
    }
    walk.reverse();

    if history.is_empty() {
        // The anchor itself is the last point
        walk.remove(0);
        walk.push(anchor);
    } else {
        walk.extend_from_slice(history);
    }
    walk
}
