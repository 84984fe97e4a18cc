//! Typed event fan-out to in-process subscribers
//!
//! Backed by a `tokio::sync::broadcast` channel. Nothing is retained: a
//! subscriber only sees events published after it subscribed, and a slow
//! subscriber that falls more than `capacity` events behind skips ahead.

use crate::analytics::correlation::CorrelationMatrix;
use crate::analytics::forecast::Forecast;
use crate::analytics::indicators::{IndicatorSet, Interpretation};
use crate::db::sqlite::models::{Alert, Asset};
use serde::Serialize;
use tokio::sync::broadcast;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum MarketEvent {
    /// Every asset of the latest snapshot
    MarketUpdate(Vec<Asset>),
    #[serde(rename_all = "camelCase")]
    TechnicalIndicatorsUpdate {
        asset_id: String,
        indicators: IndicatorSet,
        interpretation: Interpretation,
    },
    CorrelationsUpdate(CorrelationMatrix),
    NewAlerts(Vec<Alert>),
    ForecastUpdate(Forecast),
}

impl MarketEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MarketEvent::MarketUpdate(_) => "marketUpdate",
            MarketEvent::TechnicalIndicatorsUpdate { .. } => "technicalIndicatorsUpdate",
            MarketEvent::CorrelationsUpdate(_) => "correlationsUpdate",
            MarketEvent::NewAlerts(_) => "newAlerts",
            MarketEvent::ForecastUpdate(_) => "forecastUpdate",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<MarketEvent>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(16));
        Self { tx }
    }

    /// Publish to current subscribers; returns how many received it
    pub fn publish(&self, event: MarketEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::debug!("Published {} to {} subscriber(s)", name, receivers);
                receivers
            }
            Err(_) => {
                tracing::debug!("No subscribers for {}", name);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
