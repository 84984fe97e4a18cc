//! Typed front over the fetch client, one method per provider resource

use crate::config::CacheConfig;
use crate::fetch::client::{FetchClient, Fetched};
use crate::providers::types::{AssetDetail, MarketChart, MarketSnapshot};
use crate::providers::MarketDataProvider;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct MarketDataClient {
    fetch: FetchClient,
    ttls: CacheConfig,
}

impl MarketDataClient {
    pub fn new(fetch: FetchClient, ttls: CacheConfig) -> Self {
        Self { fetch, ttls }
    }

    /// Top `count` assets by market cap
    pub async fn markets(&self, count: u32) -> Fetched<MarketSnapshot> {
        let ttl = Duration::from_secs(self.ttls.markets_ttl_secs);
        self.fetch
            .fetch(&format!("markets:{}", count), ttl, move |p: Arc<dyn MarketDataProvider>| async move {
                p.fetch_markets(count).await
            })
            .await
    }

    pub async fn asset_detail(&self, asset_id: &str) -> Fetched<AssetDetail> {
        let ttl = Duration::from_secs(self.ttls.detail_ttl_secs);
        let id = asset_id.to_string();
        self.fetch
            .fetch(&format!("detail:{}", asset_id), ttl, move |p: Arc<dyn MarketDataProvider>| {
                let id = id.clone();
                async move { p.fetch_asset_detail(&id).await }
            })
            .await
    }

    /// Price/market-cap/volume history over the last `days`
    pub async fn market_chart(&self, asset_id: &str, days: u32) -> Fetched<MarketChart> {
        let ttl = Duration::from_secs(self.ttls.chart_ttl_secs);
        let id = asset_id.to_string();
        self.fetch
            .fetch(
                &format!("chart:{}:{}", asset_id, days),
                ttl,
                move |p: Arc<dyn MarketDataProvider>| {
                    let id = id.clone();
                    async move { p.fetch_market_chart(&id, days).await }
                },
            )
            .await
    }

    pub fn fetch_client(&self) -> &FetchClient {
        &self.fetch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::fetch::client::FetchSource;
    use crate::fetch::rate_limiter::RateLimiter;
    use crate::fetch::retry::RetryPolicy;
    use crate::providers::mock::{chart, MockProvider};
    use crate::providers::types::AssetDetail;
    use crate::providers::ProviderPool;

    fn client(mock: Arc<MockProvider>) -> MarketDataClient {
        let pool = ProviderPool::new(vec![mock as Arc<dyn MarketDataProvider>]).unwrap();
        let fetch = FetchClient::new(
            Arc::new(pool),
            RateLimiter::new(30, Duration::from_secs(60)),
            RetryPolicy::new(0, Duration::from_millis(10), 2.0),
        );
        MarketDataClient::new(fetch, CacheConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_chart_keys_are_per_asset_and_window() {
        let mock = Arc::new(MockProvider::new("primary"));
        mock.set_fallback_chart(chart(&[1.0, 2.0, 3.0], 0));
        let client = client(mock.clone());

        client.market_chart("bitcoin", 30).await;
        client.market_chart("bitcoin", 30).await;
        client.market_chart("bitcoin", 7).await;
        client.market_chart("ethereum", 30).await;

        assert_eq!(mock.calls(), 3);
        assert_eq!(client.fetch_client().cached_entries(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_detail_returns_default() {
        let mock = Arc::new(MockProvider::new("primary"));
        let client = client(mock.clone());

        let detail = client.asset_detail("nope").await;
        assert_eq!(detail.source, FetchSource::Default);
        assert!(detail.payload.id.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detail_served_from_cache() {
        let mock = Arc::new(MockProvider::new("primary"));
        mock.push_detail(Ok(AssetDetail {
            id: "bitcoin".into(),
            name: "Bitcoin".into(),
            ..Default::default()
        }));
        mock.push_detail(Err(AppError::Internal("should not be called".into())));
        let client = client(mock.clone());

        client.asset_detail("bitcoin").await;
        let cached = client.asset_detail("bitcoin").await;

        assert_eq!(cached.source, FetchSource::Cache);
        assert_eq!(cached.payload.name, "Bitcoin");
        assert_eq!(mock.calls(), 1);
    }
}
