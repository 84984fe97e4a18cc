//! Pipeline configuration
//!
//! Loaded from a JSON file (path from `COINSIGHT_CONFIG`, default
//! `coinsight.json`). Every section falls back to its defaults, so a missing
//! file or a partial file is valid.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "COINSIGHT_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "coinsight.json";

/// Largest accepted retry count
const MAX_RETRIES_LIMIT: u32 = 10;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub fetch: FetchConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub anomaly: AnomalyConfig,
    pub indicators: IndicatorConfig,
    pub correlation: CorrelationConfig,
    pub forecast: ForecastConfig,
    pub alerts: AlertConfig,
    pub storage: StorageConfig,
}

/// Upstream provider endpoints, in failover order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_urls: Vec<String>,
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub vs_currency: String,
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_urls: vec![
                "https://api.coingecko.com/api/v3".to_string(),
                "https://pro-api.coingecko.com/api/v3".to_string(),
            ],
            api_key: None,
            api_key_header: "x-cg-demo-api-key".to_string(),
            vs_currency: "usd".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Periodic fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Market snapshot interval (seconds)
    pub fetch_interval_secs: u64,
    /// Historical chart / forecast refresh interval (seconds)
    pub detailed_fetch_interval_secs: u64,
    /// Indicator/correlation analysis interval (seconds)
    pub analysis_interval_secs: u64,
    /// Number of assets in the tracked basket
    pub asset_count: u32,
    /// Lookback for the historical chart endpoint (days)
    pub chart_days: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            fetch_interval_secs: 60,
            detailed_fetch_interval_secs: 3600,
            analysis_interval_secs: 300,
            asset_count: 20,
            chart_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2000,
            backoff_factor: 2.0,
        }
    }
}

/// Cache TTL per resource kind (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub markets_ttl_secs: u64,
    pub detail_ttl_secs: u64,
    pub chart_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            markets_ttl_secs: 60,
            detail_ttl_secs: 300,
            chart_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub price_threshold_pct: f64,
    pub volume_threshold_pct: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            price_threshold_pct: 5.0,
            volume_threshold_pct: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub sma_periods: Vec<usize>,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// History window read for each calculation (days)
    pub window_days: u32,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sma_periods: vec![7, 25, 99],
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            window_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub window_days: u32,
    /// Maximum timestamp distance for two points to be paired (milliseconds)
    pub alignment_tolerance_ms: i64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            alignment_tolerance_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub linear_weight: f64,
    pub holt_weight: f64,
    pub autoregressive_weight: f64,
    pub alpha: f64,
    pub beta: f64,
    pub ar_order: usize,
    pub ridge_lambda: f64,
    pub horizon_days: usize,
    pub staleness_secs: u64,
    pub min_history: usize,
    pub band_pct: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            linear_weight: 0.3,
            holt_weight: 0.3,
            autoregressive_weight: 0.4,
            alpha: 0.5,
            beta: 0.3,
            ar_order: 3,
            ridge_lambda: 1e-6,
            horizon_days: 7,
            staleness_secs: 12 * 3600,
            min_history: 10,
            band_pct: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Interpretation strength at which a strong buy/sell alert fires
    pub strong_signal_threshold: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            strong_signal_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub retention_days: u32,
    pub retention_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            retention_days: 90,
            retention_interval_secs: 24 * 3600,
        }
    }
}

impl AppConfig {
    /// Load from the file named by `COINSIGHT_CONFIG`, or defaults if absent
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    /// Load from a specific path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            let config: AppConfig = serde_json::from_str(&raw)?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::info!("No config file at {:?}, using defaults", path);
            AppConfig::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.provider.base_urls.is_empty() {
            return Err(AppError::Config("at least one provider base URL is required".into()));
        }
        for base in &self.provider.base_urls {
            url::Url::parse(base)
                .map_err(|e| AppError::Config(format!("invalid provider URL '{}': {}", base, e)))?;
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            return Err(AppError::Config("rate limit ceiling and window must be positive".into()));
        }
        if self.retry.max_retries > MAX_RETRIES_LIMIT {
            return Err(AppError::Config(format!(
                "retry count must be at most {}",
                MAX_RETRIES_LIMIT
            )));
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(AppError::Config("retry backoff factor must be >= 1".into()));
        }
        if self.indicators.sma_periods.is_empty() || self.indicators.sma_periods.contains(&0) {
            return Err(AppError::Config("SMA periods must be non-empty and positive".into()));
        }
        if self.indicators.macd_fast >= self.indicators.macd_slow {
            return Err(AppError::Config("MACD fast period must be shorter than slow period".into()));
        }
        if self.indicators.rsi_oversold >= self.indicators.rsi_overbought {
            return Err(AppError::Config("RSI oversold threshold must be below overbought".into()));
        }
        let weights = [
            self.forecast.linear_weight,
            self.forecast.holt_weight,
            self.forecast.autoregressive_weight,
        ];
        if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(AppError::Config("forecast weights must be non-negative with a positive sum".into()));
        }
        if self.forecast.ar_order == 0 {
            return Err(AppError::Config("autoregression order must be positive".into()));
        }
        Ok(())
    }
}
