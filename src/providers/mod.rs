//! Market data provider adapters

pub mod types;
pub mod coingecko;
#[cfg(test)]
pub mod mock;

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use types::*;

/// Provider trait that every upstream data source implements
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider ID (e.g. the endpoint host)
    fn id(&self) -> &str;

    /// Market list, ordered by market cap, limited to `count` assets
    async fn fetch_markets(&self, count: u32) -> Result<MarketSnapshot>;

    /// Detail for a single asset
    async fn fetch_asset_detail(&self, asset_id: &str) -> Result<AssetDetail>;

    /// Historical chart for a lookback window in days
    async fn fetch_market_chart(&self, asset_id: &str, days: u32) -> Result<MarketChart>;
}

/// Ordered provider endpoints with a rotating "current" index.
///
/// Rate-limit responses move the pool to the next endpoint; it wraps around
/// after the last one.
pub struct ProviderPool {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    current: AtomicUsize,
}

impl ProviderPool {
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>) -> Result<Self> {
        if providers.is_empty() {
            return Err(AppError::Config("provider pool needs at least one endpoint".into()));
        }
        Ok(Self {
            providers,
            current: AtomicUsize::new(0),
        })
    }

    /// Build one HTTP provider per configured base URL
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let providers = config
            .base_urls
            .iter()
            .map(|base| {
                coingecko::CoinGeckoProvider::new(base, config)
                    .map(|p| Arc::new(p) as Arc<dyn MarketDataProvider>)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(providers)
    }

    /// Provider currently in use
    pub fn current(&self) -> Arc<dyn MarketDataProvider> {
        let idx = self.current.load(Ordering::SeqCst) % self.providers.len();
        self.providers[idx].clone()
    }

    /// Switch to the next endpoint and return it
    pub fn failover(&self) -> Arc<dyn MarketDataProvider> {
        let next = (self.current.fetch_add(1, Ordering::SeqCst) + 1) % self.providers.len();
        let provider = self.providers[next].clone();
        tracing::warn!("Provider failover -> {}", provider.id());
        provider
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
