//! CoinGecko-compatible REST adapter
//!
//! Any endpoint exposing `/coins/markets`, `/coins/{id}` and
//! `/coins/{id}/market_chart` in the CoinGecko shape works here; the pool
//! holds one instance per configured base URL.

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::providers::types::*;
use crate::providers::MarketDataProvider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// CoinGecko-compatible provider implementation
pub struct CoinGeckoProvider {
    id: String,
    base_url: Url,
    client: Client,
    api_key: Option<String>,
    api_key_header: String,
    vs_currency: String,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str, config: &ProviderConfig) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| AppError::Config(format!("invalid provider URL '{}': {}", normalized, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            id: base_url.host_str().unwrap_or("provider").to_string(),
            base_url,
            client,
            api_key: config.api_key.clone(),
            api_key_header: config.api_key_header.clone(),
            vs_currency: config.vs_currency.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| AppError::Internal(format!("bad request path '{}': {}", path, e)))?;

        let mut request = self.client.get(url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header(self.api_key_header.as_str(), key.as_str());
        }

        let response = request.send().await.map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, path));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::DataShape(format!("{}: {}", path, e)))
    }
}

/// Map a transport-level failure onto the error taxonomy
fn classify_transport(err: reqwest::Error) -> AppError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        AppError::TransientNetwork(err.to_string())
    } else {
        AppError::Http(err)
    }
}

/// Map a non-success HTTP status onto the error taxonomy
pub(crate) fn classify_status(status: StatusCode, path: &str) -> AppError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            AppError::NotFound(format!("{} returned {}", path, status))
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN => {
            AppError::RateLimited(format!("{} returned {}", path, status))
        }
        StatusCode::REQUEST_TIMEOUT => AppError::TransientNetwork(format!("{} returned {}", path, status)),
        s if s.is_server_error() => AppError::TransientNetwork(format!("{} returned {}", path, s)),
        s => AppError::Internal(format!("{} returned {}", path, s)),
    }
}

#[derive(Deserialize)]
struct RawDetail {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    description: HashMap<String, Option<String>>,
    #[serde(default)]
    categories: Vec<Option<String>>,
    #[serde(default)]
    links: Option<RawLinks>,
    #[serde(default)]
    market_data: Option<RawDetailMarket>,
}

#[derive(Deserialize)]
struct RawLinks {
    #[serde(default)]
    homepage: Vec<String>,
}

#[derive(Deserialize)]
struct RawDetailMarket {
    #[serde(default)]
    current_price: HashMap<String, f64>,
    #[serde(default)]
    ath: HashMap<String, f64>,
    #[serde(default)]
    atl: HashMap<String, f64>,
    price_change_percentage_7d: Option<f64>,
    price_change_percentage_30d: Option<f64>,
}

#[derive(Deserialize)]
struct RawChart {
    prices: Vec<(f64, f64)>,
    #[serde(default)]
    market_caps: Vec<(f64, f64)>,
    #[serde(default)]
    total_volumes: Vec<(f64, f64)>,
}

fn to_points(raw: Vec<(f64, f64)>) -> Vec<ChartPoint> {
    raw.into_iter()
        .map(|(ts, value)| ChartPoint {
            timestamp_ms: ts as i64,
            value,
        })
        .collect()
}

impl RawDetail {
    fn into_detail(self, vs_currency: &str) -> AssetDetail {
        let market = self.market_data;
        let pick = |map: Option<&HashMap<String, f64>>| map.and_then(|m| m.get(vs_currency).copied());

        AssetDetail {
            description: self
                .description
                .get("en")
                .cloned()
                .flatten()
                .filter(|d| !d.is_empty()),
            categories: self.categories.into_iter().flatten().collect(),
            homepage: self
                .links
                .and_then(|l| l.homepage.into_iter().find(|h| !h.is_empty())),
            current_price: pick(market.as_ref().map(|m| &m.current_price)),
            all_time_high: pick(market.as_ref().map(|m| &m.ath)),
            all_time_low: pick(market.as_ref().map(|m| &m.atl)),
            price_change_percentage_7d: market.as_ref().and_then(|m| m.price_change_percentage_7d),
            price_change_percentage_30d: market.as_ref().and_then(|m| m.price_change_percentage_30d),
            id: self.id,
            symbol: self.symbol,
            name: self.name,
        }
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_markets(&self, count: u32) -> Result<MarketSnapshot> {
        let query = [
            ("vs_currency", self.vs_currency.clone()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", count.to_string()),
            ("page", "1".to_string()),
            ("sparkline", "false".to_string()),
        ];

        let snapshot: MarketSnapshot = self.get_json("coins/markets", &query).await?;
        tracing::debug!("{} returned {} assets", self.id, snapshot.len());
        Ok(snapshot)
    }

    async fn fetch_asset_detail(&self, asset_id: &str) -> Result<AssetDetail> {
        let query = [
            ("localization", "false".to_string()),
            ("tickers", "false".to_string()),
            ("community_data", "false".to_string()),
            ("developer_data", "false".to_string()),
        ];

        let raw: RawDetail = self.get_json(&format!("coins/{}", asset_id), &query).await?;
        Ok(raw.into_detail(&self.vs_currency))
    }

    async fn fetch_market_chart(&self, asset_id: &str, days: u32) -> Result<MarketChart> {
        let query = [
            ("vs_currency", self.vs_currency.clone()),
            ("days", days.to_string()),
        ];

        let raw: RawChart = self
            .get_json(&format!("coins/{}/market_chart", asset_id), &query)
            .await?;

        if raw.prices.is_empty() {
            return Err(AppError::DataShape(format!("empty price chart for {}", asset_id)));
        }

        Ok(MarketChart {
            prices: to_points(raw.prices),
            market_caps: to_points(raw.market_caps),
            total_volumes: to_points(raw.total_volumes),
        })
    }
}
