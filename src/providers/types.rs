//! Common provider types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One asset's field-set from the market-list endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetFields {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub price_change_percentage_24h: Option<f64>,
    pub total_volume: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// One ingestion cycle's full list of asset field-sets
pub type MarketSnapshot = Vec<AssetFields>;

/// Per-asset detail
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetDetail {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub homepage: Option<String>,
    pub current_price: Option<f64>,
    pub all_time_high: Option<f64>,
    pub all_time_low: Option<f64>,
    pub price_change_percentage_7d: Option<f64>,
    pub price_change_percentage_30d: Option<f64>,
}

/// A `[timestamp_ms, value]` pair from the chart endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// Historical chart for one asset over a lookback window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketChart {
    pub prices: Vec<ChartPoint>,
    pub market_caps: Vec<ChartPoint>,
    pub total_volumes: Vec<ChartPoint>,
}

impl MarketChart {
    /// Price series as `(timestamp, price)` pairs, oldest first
    pub fn price_series(&self) -> Vec<(DateTime<Utc>, f64)> {
        let mut series: Vec<(DateTime<Utc>, f64)> = self
            .prices
            .iter()
            .filter(|p| p.value.is_finite())
            .filter_map(|p| DateTime::from_timestamp_millis(p.timestamp_ms).map(|ts| (ts, p.value)))
            .collect();
        series.sort_by_key(|(ts, _)| *ts);
        series
    }

    /// Market cap and volume matching a price timestamp, if present
    pub fn companions_at(&self, timestamp_ms: i64) -> (Option<f64>, Option<f64>) {
        let find = |points: &[ChartPoint]| {
            points
                .iter()
                .find(|p| p.timestamp_ms == timestamp_ms)
                .map(|p| p.value)
        };
        (find(&self.market_caps), find(&self.total_volumes))
    }
}
