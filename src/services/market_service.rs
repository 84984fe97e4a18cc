//! Market Service
//!
//! Processes one market snapshot: upserts assets, appends price points and
//! flags price/volume moves against the previous snapshot.

use crate::broadcast::{Broadcaster, MarketEvent};
use crate::config::AnomalyConfig;
use crate::db::duckdb::models::PricePoint;
use crate::db::duckdb::DuckDb;
use crate::db::sqlite::models::{Alert, Anomaly, AnomalyKind, Asset};
use crate::db::sqlite::SqliteDb;
use crate::providers::types::AssetFields;
use crate::services::alert_service::AlertService;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Last observed values for one asset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub price: f64,
    pub volume: Option<f64>,
}

/// Outcome of processing one snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessResult {
    pub updated_count: usize,
    pub new_count: usize,
    /// Entries dropped for a missing id or price
    pub skipped_count: usize,
    pub anomalies: Vec<Anomaly>,
    pub alerts: Vec<Alert>,
}

pub struct MarketService {
    sqlite: Arc<SqliteDb>,
    duckdb: Arc<DuckDb>,
    config: AnomalyConfig,
    previous: DashMap<String, Observation>,
    /// Ids of the last processed snapshot, in snapshot order
    basket: RwLock<Vec<String>>,
    alerts: Arc<AlertService>,
    events: Broadcaster,
}

/// Percentage change from `old` to `new`; undefined for a zero base
fn percentage_change(old: f64, new: f64) -> Option<f64> {
    if old == 0.0 || !old.is_finite() || !new.is_finite() {
        return None;
    }
    Some((new - old) / old.abs() * 100.0)
}

/// Compare an asset against its previous observation
pub fn detect_anomalies(
    asset: &Asset,
    previous: Option<&Observation>,
    config: &AnomalyConfig,
    now: DateTime<Utc>,
) -> Vec<Anomaly> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let mut candidates = vec![(
        AnomalyKind::Price,
        previous.price,
        asset.current_price,
        config.price_threshold_pct,
    )];
    if let (Some(old), Some(new)) = (previous.volume, asset.total_volume) {
        candidates.push((AnomalyKind::Volume, old, new, config.volume_threshold_pct));
    }

    candidates
        .into_iter()
        .filter_map(|(kind, old, new, threshold)| {
            let pct = percentage_change(old, new)?;
            if pct.abs() <= threshold {
                return None;
            }
            Some(Anomaly {
                asset_id: asset.id.clone(),
                kind,
                old_value: old,
                new_value: new,
                percentage_change: pct,
                threshold_pct: threshold,
                description: format!(
                    "{} {} {} {:.2}% ({} -> {})",
                    asset.name,
                    kind.as_str(),
                    if pct >= 0.0 { "rose" } else { "fell" },
                    pct.abs(),
                    old,
                    new
                ),
                timestamp: now,
            })
        })
        .collect()
}

impl MarketService {
    pub fn new(
        sqlite: Arc<SqliteDb>,
        duckdb: Arc<DuckDb>,
        config: AnomalyConfig,
        alerts: Arc<AlertService>,
        events: Broadcaster,
    ) -> Self {
        Self {
            sqlite,
            duckdb,
            config,
            previous: DashMap::new(),
            basket: RwLock::new(Vec::new()),
            alerts,
            events,
        }
    }

    pub fn process(&self, snapshot: &[AssetFields]) -> ProcessResult {
        self.process_at(snapshot, Utc::now())
    }

    /// Process a snapshot observed at `now`. Per-asset persistence failures
    /// are logged and never stop the remaining assets.
    pub fn process_at(&self, snapshot: &[AssetFields], now: DateTime<Utc>) -> ProcessResult {
        let mut result = ProcessResult::default();
        let mut assets = Vec::with_capacity(snapshot.len());

        for fields in snapshot {
            let Some(asset) = Asset::from_fields(fields, now) else {
                warn!("Skipping snapshot entry '{}': missing id or price", fields.id);
                result.skipped_count += 1;
                continue;
            };

            match self.sqlite.upsert_asset(&asset) {
                Ok(true) => result.new_count += 1,
                Ok(false) => result.updated_count += 1,
                Err(e) => {
                    error!("Failed to upsert asset {}: {}", asset.id, e);
                    continue;
                }
            }

            let point = PricePoint {
                asset_id: asset.id.clone(),
                price: asset.current_price,
                market_cap: asset.market_cap,
                volume: asset.total_volume,
                timestamp: asset.last_updated,
            };
            if let Err(e) = self.duckdb.append_price_points(&[point]) {
                error!("Failed to append price point for {}: {}", asset.id, e);
            }

            let observation = Observation {
                price: asset.current_price,
                volume: asset.total_volume,
            };
            let previous = self.previous.insert(asset.id.clone(), observation);
            let anomalies = detect_anomalies(&asset, previous.as_ref(), &self.config, now);

            for anomaly in anomalies {
                if let Err(e) = self.sqlite.insert_anomaly(&anomaly) {
                    error!("Failed to store anomaly for {}: {}", anomaly.asset_id, e);
                }
                match self.alerts.from_anomaly_at(&anomaly, now) {
                    Ok(Some(alert)) => result.alerts.push(alert),
                    Ok(None) => {}
                    Err(e) => error!("Failed to raise alert for {}: {}", anomaly.asset_id, e),
                }
                result.anomalies.push(anomaly);
            }

            assets.push(asset);
        }

        info!(
            "Processed snapshot: {} new, {} updated, {} skipped, {} anomalies",
            result.new_count,
            result.updated_count,
            result.skipped_count,
            result.anomalies.len()
        );

        if !assets.is_empty() {
            *self.basket.write() = assets.iter().map(|a| a.id.clone()).collect();
        }

        self.events.publish(MarketEvent::MarketUpdate(assets));
        if !result.alerts.is_empty() {
            self.events.publish(MarketEvent::NewAlerts(result.alerts.clone()));
        }

        result
    }

    pub fn previous(&self, asset_id: &str) -> Option<Observation> {
        self.previous.get(asset_id).map(|entry| *entry)
    }

    /// Asset ids of the most recent snapshot that yielded any asset; empty
    /// before the first one
    pub fn latest_asset_ids(&self) -> Vec<String> {
        self.basket.read().clone()
    }
}
