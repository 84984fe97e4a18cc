//! Correlation Service

use crate::analytics::correlation::{correlation_matrix, CorrelationMatrix, TimedSeries};
use crate::broadcast::{Broadcaster, MarketEvent};
use crate::config::CorrelationConfig;
use crate::db::duckdb::DuckDb;
use crate::db::sqlite::models::CorrelationEdge;
use crate::db::sqlite::SqliteDb;
use crate::db::to_millis;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::info;

pub struct CorrelationService {
    sqlite: Arc<SqliteDb>,
    duckdb: Arc<DuckDb>,
    config: CorrelationConfig,
    events: Broadcaster,
}

/// Label stored with every edge of a matrix
pub fn timeframe_label(window_days: u32) -> String {
    format!("{}d", window_days)
}

impl CorrelationService {
    pub fn new(
        sqlite: Arc<SqliteDb>,
        duckdb: Arc<DuckDb>,
        config: CorrelationConfig,
        events: Broadcaster,
    ) -> Self {
        Self {
            sqlite,
            duckdb,
            config,
            events,
        }
    }

    pub fn calculate_correlations(
        &self,
        asset_ids: &[String],
        window_days: u32,
    ) -> Result<CorrelationMatrix> {
        self.calculate_correlations_at(asset_ids, window_days, Utc::now())
    }

    /// Pairwise matrix over the `window_days` ending at `now`; persists the
    /// canonical edges and publishes the matrix
    pub fn calculate_correlations_at(
        &self,
        asset_ids: &[String],
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<CorrelationMatrix> {
        let from = now - Duration::days(window_days as i64);

        let mut ids: Vec<&String> = Vec::with_capacity(asset_ids.len());
        for id in asset_ids {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        let mut series: Vec<(String, TimedSeries)> = Vec::with_capacity(ids.len());
        for id in ids {
            let history = self.duckdb.price_history(id, from, now)?;
            let points = history
                .iter()
                .map(|p| (to_millis(&p.timestamp), p.price))
                .collect();
            series.push((id.clone(), points));
        }

        let timeframe = timeframe_label(window_days);
        let matrix = correlation_matrix(&series, self.config.alignment_tolerance_ms, &timeframe, now);

        let edges = matrix.edges();
        self.sqlite.insert_correlations(&edges)?;
        info!(
            "Correlation matrix ({}) for {} assets, {} edges stored",
            timeframe,
            matrix.asset_ids.len(),
            edges.len()
        );

        self.events.publish(MarketEvent::CorrelationsUpdate(matrix.clone()));
        Ok(matrix)
    }

    /// Edges of the latest stored matrix for a window
    pub fn latest(&self, window_days: u32) -> Result<Vec<CorrelationEdge>> {
        self.sqlite.latest_correlations(&timeframe_label(window_days))
    }
}
