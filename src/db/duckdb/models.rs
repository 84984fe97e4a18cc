//! DuckDB data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One price observation for an asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub asset_id: String,
    pub price: f64,
    pub market_cap: Option<f64>,
    pub volume: Option<f64>,
    pub timestamp: DateTime<Utc>,
}
