//! Coinsight - crypto market ingestion and analytics pipeline
//!
//! Periodically pulls market snapshots for a basket of crypto-assets from a
//! rate-limited provider, stores the price history, and derives anomalies,
//! technical indicators, correlations, forecasts and alerts.

pub mod analytics;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod providers;
pub mod scheduler;
pub mod services;
pub mod state;

use broadcast::MarketEvent;
use config::AppConfig;
use error::Result;
use scheduler::PipelineScheduler;
use state::AppState;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber (`RUST_LOG`, default `coinsight=debug`)
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coinsight=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the pipeline until Ctrl-C
pub async fn run(config: AppConfig) -> Result<()> {
    tracing::info!("Starting Coinsight...");

    let state = Arc::new(AppState::new(config)?);
    tracing::info!("Application state initialized");

    let mut events = state.events.subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log fell behind, skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let scheduler = PipelineScheduler::new(state.clone());
    scheduler.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    scheduler.stop();
    event_log.abort();
    Ok(())
}

fn log_event(event: &MarketEvent) {
    match event {
        MarketEvent::MarketUpdate(assets) => {
            tracing::debug!("marketUpdate: {} assets", assets.len())
        }
        MarketEvent::NewAlerts(alerts) => {
            for alert in alerts {
                tracing::info!("[{}] {}", alert.severity.as_str(), alert.message);
            }
        }
        other => tracing::debug!("{}", other.name()),
    }
}
