//! Application state management

use crate::broadcast::Broadcaster;
use crate::config::AppConfig;
use crate::db::duckdb::DuckDb;
use crate::db::sqlite::SqliteDb;
use crate::error::Result;
use crate::fetch::{FetchClient, MarketDataClient, RateLimiter, RetryPolicy};
use crate::providers::ProviderPool;
use crate::services::{AlertService, CorrelationService, ForecastService, IndicatorService, MarketService};
use std::path::PathBuf;
use std::sync::Arc;

/// Application state shared by the pipeline and the scheduler
pub struct AppState {
    pub config: AppConfig,

    /// SQLite database for assets, indicators, anomalies, alerts, correlations
    pub sqlite: Arc<SqliteDb>,

    /// DuckDB connection for the price time series
    pub duckdb: Arc<DuckDb>,

    /// Cached, rate-limited provider access
    pub market_client: MarketDataClient,

    /// Event fan-out to subscribers
    pub events: Broadcaster,

    pub alerts: Arc<AlertService>,
    pub market: Arc<MarketService>,
    pub indicators: Arc<IndicatorService>,
    pub correlations: Arc<CorrelationService>,
    pub forecasts: Arc<ForecastService>,

    /// Directory holding both database files
    pub data_dir: PathBuf,
}

impl AppState {
    /// Open the databases under the configured data directory and build
    /// one HTTP provider per configured endpoint
    pub fn new(config: AppConfig) -> Result<Self> {
        let data_dir = config.storage.data_dir.clone();

        // Create data directory if it doesn't exist
        std::fs::create_dir_all(&data_dir)?;

        tracing::info!("Data directory: {:?}", data_dir);

        let sqlite = Arc::new(SqliteDb::new(&data_dir.join("coinsight.db"))?);
        let duckdb = Arc::new(DuckDb::new(&data_dir.join("history.duckdb"))?);
        let pool = Arc::new(ProviderPool::from_config(&config.provider)?);

        Ok(Self::assemble(config, sqlite, duckdb, pool, data_dir))
    }

    /// In-memory databases and a caller-supplied provider pool
    pub fn in_memory(config: AppConfig, pool: Arc<ProviderPool>) -> Result<Self> {
        let sqlite = Arc::new(SqliteDb::open_in_memory()?);
        let duckdb = Arc::new(DuckDb::open_in_memory()?);
        let data_dir = config.storage.data_dir.clone();
        Ok(Self::assemble(config, sqlite, duckdb, pool, data_dir))
    }

    fn assemble(
        config: AppConfig,
        sqlite: Arc<SqliteDb>,
        duckdb: Arc<DuckDb>,
        pool: Arc<ProviderPool>,
        data_dir: PathBuf,
    ) -> Self {
        let limiter = RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window());
        let retry = RetryPolicy::from(&config.retry);
        let market_client = MarketDataClient::new(
            FetchClient::new(pool, limiter, retry),
            config.cache.clone(),
        );

        let events = Broadcaster::default();

        let alerts = Arc::new(AlertService::new(
            sqlite.clone(),
            config.alerts.strong_signal_threshold,
        ));
        let market = Arc::new(MarketService::new(
            sqlite.clone(),
            duckdb.clone(),
            config.anomaly.clone(),
            alerts.clone(),
            events.clone(),
        ));
        let indicators = Arc::new(IndicatorService::new(
            sqlite.clone(),
            duckdb.clone(),
            config.indicators.clone(),
            alerts.clone(),
            events.clone(),
        ));
        let correlations = Arc::new(CorrelationService::new(
            sqlite.clone(),
            duckdb.clone(),
            config.correlation.clone(),
            events.clone(),
        ));
        let forecasts = Arc::new(ForecastService::new(
            duckdb.clone(),
            config.forecast.clone(),
            events.clone(),
        ));

        Self {
            config,
            sqlite,
            duckdb,
            market_client,
            events,
            alerts,
            market,
            indicators,
            correlations,
            forecasts,
            data_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_new_creates_database_files() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.data_dir = dir.path().join("data");

        let state = AppState::new(config).unwrap();

        assert!(state.data_dir.join("coinsight.db").exists());
        assert!(state.data_dir.join("history.duckdb").exists());
        assert_eq!(state.market_client.fetch_client().pool().len(), 2);
    }
}
