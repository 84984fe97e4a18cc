//! Scripted provider for tests

use crate::error::{AppError, Result};
use crate::providers::types::*;
use crate::providers::MarketDataProvider;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Provider whose responses are queued up front.
///
/// Each method pops its next scripted result; an empty queue answers with
/// the fallback value (or `TransientNetwork` when no fallback is set).
pub struct MockProvider {
    id: String,
    markets: Mutex<VecDeque<Result<MarketSnapshot>>>,
    charts: Mutex<VecDeque<Result<MarketChart>>>,
    details: Mutex<VecDeque<Result<AssetDetail>>>,
    fallback_markets: Mutex<Option<MarketSnapshot>>,
    fallback_chart: Mutex<Option<MarketChart>>,
    latency: Mutex<Duration>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            markets: Mutex::new(VecDeque::new()),
            charts: Mutex::new(VecDeque::new()),
            details: Mutex::new(VecDeque::new()),
            fallback_markets: Mutex::new(None),
            fallback_chart: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push_markets(&self, result: Result<MarketSnapshot>) {
        self.markets.lock().push_back(result);
    }

    pub fn push_chart(&self, result: Result<MarketChart>) {
        self.charts.lock().push_back(result);
    }

    pub fn push_detail(&self, result: Result<AssetDetail>) {
        self.details.lock().push_back(result);
    }

    pub fn set_fallback_markets(&self, snapshot: MarketSnapshot) {
        *self.fallback_markets.lock() = Some(snapshot);
    }

    pub fn set_fallback_chart(&self, chart: MarketChart) {
        *self.fallback_chart.lock() = Some(chart);
    }

    /// Simulated response time for every call
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Total calls across all methods
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

/// Build a snapshot entry with the fields the pipeline reads
pub fn asset(id: &str, price: f64, volume: f64) -> AssetFields {
    AssetFields {
        id: id.to_string(),
        symbol: id.chars().take(3).collect(),
        name: id.to_string(),
        current_price: Some(price),
        market_cap: Some(price * 1_000_000.0),
        market_cap_rank: Some(1),
        total_volume: Some(volume),
        ..Default::default()
    }
}

/// Build a daily chart from a price list, starting at `start_ms`
pub fn chart(prices: &[f64], start_ms: i64) -> MarketChart {
    const DAY_MS: i64 = 86_400_000;
    let points = |values: Vec<f64>| {
        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| ChartPoint {
                timestamp_ms: start_ms + i as i64 * DAY_MS,
                value,
            })
            .collect::<Vec<_>>()
    };
    MarketChart {
        prices: points(prices.to_vec()),
        market_caps: points(prices.iter().map(|p| p * 1000.0).collect()),
        total_volumes: points(vec![1_000.0; prices.len()]),
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_markets(&self, _count: u32) -> Result<MarketSnapshot> {
        self.record_call().await;
        let next = self.markets.lock().pop_front();
        match next {
            Some(result) => result,
            None => self
                .fallback_markets
                .lock()
                .clone()
                .ok_or_else(|| AppError::TransientNetwork("no scripted markets".into())),
        }
    }

    async fn fetch_asset_detail(&self, asset_id: &str) -> Result<AssetDetail> {
        self.record_call().await;
        let next = self.details.lock().pop_front();
        next.unwrap_or_else(|| Err(AppError::NotFound(format!("coins/{}", asset_id))))
    }

    async fn fetch_market_chart(&self, _asset_id: &str, _days: u32) -> Result<MarketChart> {
        self.record_call().await;
        let next = self.charts.lock().pop_front();
        match next {
            Some(result) => result,
            None => self
                .fallback_chart
                .lock()
                .clone()
                .ok_or_else(|| AppError::TransientNetwork("no scripted chart".into())),
        }
    }
}
