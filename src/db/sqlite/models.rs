//! SQLite database models

use crate::error::{AppError, Result};
use crate::providers::types::{AssetDetail, AssetFields};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Tracked asset, upserted every ingestion cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub price_change_percentage_24h: Option<f64>,
    pub total_volume: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

impl Asset {
    /// Build from a snapshot entry; `None` when the id or price is missing
    pub fn from_fields(fields: &AssetFields, now: DateTime<Utc>) -> Option<Self> {
        if fields.id.is_empty() {
            return None;
        }
        let current_price = fields.current_price.filter(|p| p.is_finite())?;
        Some(Self {
            id: fields.id.clone(),
            symbol: fields.symbol.clone(),
            name: fields.name.clone(),
            current_price,
            market_cap: fields.market_cap,
            market_cap_rank: fields.market_cap_rank,
            price_change_percentage_24h: fields.price_change_percentage_24h,
            total_volume: fields.total_volume,
            circulating_supply: fields.circulating_supply,
            total_supply: fields.total_supply,
            max_supply: fields.max_supply,
            last_updated: fields.last_updated.unwrap_or(now),
        })
    }
}

/// Descriptive profile of an asset, refreshed by the detailed cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetProfile {
    pub asset_id: String,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub homepage: Option<String>,
    pub all_time_high: Option<f64>,
    pub all_time_low: Option<f64>,
    pub price_change_percentage_7d: Option<f64>,
    pub price_change_percentage_30d: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl AssetProfile {
    /// `None` for a detail payload with no id
    pub fn from_detail(detail: &AssetDetail, now: DateTime<Utc>) -> Option<Self> {
        if detail.id.is_empty() {
            return None;
        }
        Some(Self {
            asset_id: detail.id.clone(),
            description: detail.description.clone().filter(|d| !d.trim().is_empty()),
            categories: detail.categories.clone(),
            homepage: detail.homepage.clone().filter(|h| !h.is_empty()),
            all_time_high: detail.all_time_high,
            all_time_low: detail.all_time_low,
            price_change_percentage_7d: detail.price_change_percentage_7d,
            price_change_percentage_30d: detail.price_change_percentage_30d,
            updated_at: now,
        })
    }
}

/// Indicator series kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Sma,
    Rsi,
    Macd,
    MacdSignal,
    MacdHistogram,
}

impl IndicatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::Sma => "sma",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Macd => "macd",
            IndicatorKind::MacdSignal => "macd_signal",
            IndicatorKind::MacdHistogram => "macd_histogram",
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndicatorKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sma" => Ok(IndicatorKind::Sma),
            "rsi" => Ok(IndicatorKind::Rsi),
            "macd" => Ok(IndicatorKind::Macd),
            "macd_signal" => Ok(IndicatorKind::MacdSignal),
            "macd_histogram" => Ok(IndicatorKind::MacdHistogram),
            other => Err(AppError::DataShape(format!("unknown indicator kind '{}'", other))),
        }
    }
}

/// Parameters an indicator value was computed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorParams {
    Sma { period: usize },
    Rsi { period: usize },
    Macd { fast: usize, slow: usize, signal: usize },
    MacdSignal { fast: usize, slow: usize, signal: usize },
    MacdHistogram { fast: usize, slow: usize, signal: usize },
}

impl IndicatorParams {
    pub fn kind(&self) -> IndicatorKind {
        match self {
            IndicatorParams::Sma { .. } => IndicatorKind::Sma,
            IndicatorParams::Rsi { .. } => IndicatorKind::Rsi,
            IndicatorParams::Macd { .. } => IndicatorKind::Macd,
            IndicatorParams::MacdSignal { .. } => IndicatorKind::MacdSignal,
            IndicatorParams::MacdHistogram { .. } => IndicatorKind::MacdHistogram,
        }
    }
}

/// Current value of one indicator for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorValue {
    pub asset_id: String,
    pub value: f64,
    pub params: IndicatorParams,
    pub timestamp: DateTime<Utc>,
}

impl IndicatorValue {
    pub fn kind(&self) -> IndicatorKind {
        self.params.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Price,
    Volume,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::Price => "price",
            AnomalyKind::Volume => "volume",
        }
    }
}

impl FromStr for AnomalyKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "price" => Ok(AnomalyKind::Price),
            "volume" => Ok(AnomalyKind::Volume),
            other => Err(AppError::DataShape(format!("unknown anomaly kind '{}'", other))),
        }
    }
}

/// Price or volume move above threshold between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub asset_id: String,
    pub kind: AnomalyKind,
    pub old_value: f64,
    pub new_value: f64,
    pub percentage_change: f64,
    /// Threshold the move was tested against (percent)
    pub threshold_pct: f64,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl FromStr for Severity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(AppError::DataShape(format!("unknown severity '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PriceIncrease,
    PriceDecrease,
    PriceSurge,
    PriceDrop,
    VolumeIncrease,
    VolumeDecrease,
    VolumeSpike,
    VolumeDrop,
    RsiOverbought,
    RsiOversold,
    MacdBullishCrossover,
    MacdBearishCrossover,
    StrongBuySignal,
    StrongSellSignal,
}

impl AlertKind {
    const ALL: [AlertKind; 14] = [
        AlertKind::PriceIncrease,
        AlertKind::PriceDecrease,
        AlertKind::PriceSurge,
        AlertKind::PriceDrop,
        AlertKind::VolumeIncrease,
        AlertKind::VolumeDecrease,
        AlertKind::VolumeSpike,
        AlertKind::VolumeDrop,
        AlertKind::RsiOverbought,
        AlertKind::RsiOversold,
        AlertKind::MacdBullishCrossover,
        AlertKind::MacdBearishCrossover,
        AlertKind::StrongBuySignal,
        AlertKind::StrongSellSignal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::PriceIncrease => "price_increase",
            AlertKind::PriceDecrease => "price_decrease",
            AlertKind::PriceSurge => "price_surge",
            AlertKind::PriceDrop => "price_drop",
            AlertKind::VolumeIncrease => "volume_increase",
            AlertKind::VolumeDecrease => "volume_decrease",
            AlertKind::VolumeSpike => "volume_spike",
            AlertKind::VolumeDrop => "volume_drop",
            AlertKind::RsiOverbought => "rsi_overbought",
            AlertKind::RsiOversold => "rsi_oversold",
            AlertKind::MacdBullishCrossover => "macd_bullish_crossover",
            AlertKind::MacdBearishCrossover => "macd_bearish_crossover",
            AlertKind::StrongBuySignal => "strong_buy_signal",
            AlertKind::StrongSellSignal => "strong_sell_signal",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        AlertKind::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| AppError::DataShape(format!("unknown alert kind '{}'", s)))
    }
}

/// Immutable alert record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub asset_id: String,
    pub kind: AlertKind,
    pub old_value: Option<f64>,
    pub new_value: Option<f64>,
    pub percentage_change: Option<f64>,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// Filters for alert queries; `None` fields do not filter
#[derive(Debug, Clone, Default)]
pub struct AlertQuery {
    pub asset_id: Option<String>,
    pub severity: Option<Severity>,
    pub kind: Option<AlertKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// Pairwise correlation, stored with `asset_a < asset_b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEdge {
    pub asset_a: String,
    pub asset_b: String,
    pub value: f64,
    pub timeframe: String,
    pub timestamp: DateTime<Utc>,
}
