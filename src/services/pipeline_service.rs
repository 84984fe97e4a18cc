//! Pipeline Service
//!
//! One pass of each periodic job: market snapshot, analysis, detailed
//! history refresh and retention. The scheduler calls these on its timers;
//! `run_cycle` chains fetch, process and analyse once.

use crate::analytics::forecast::Forecast;
use crate::db::duckdb::models::PricePoint;
use crate::db::sqlite::models::AssetProfile;
use crate::error::{AppError, ErrorResponse, Result};
use crate::fetch::FetchSource;
use crate::providers::types::MarketChart;
use crate::services::indicator_service::IndicatorReport;
use crate::services::market_service::ProcessResult;
use crate::state::AppState;
use chrono::{Duration, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};

/// Per-asset failure inside a batch
#[derive(Debug, Clone, Serialize)]
pub struct AssetFailure {
    pub asset_id: String,
    #[serde(flatten)]
    pub error: ErrorResponse,
}

impl AssetFailure {
    fn new(asset_id: &str, err: &AppError) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            error: ErrorResponse::from(err),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketCycleReport {
    pub source: FetchSource,
    /// `None` when no snapshot was available at all
    pub result: Option<ProcessResult>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisReport {
    pub indicators: Vec<IndicatorReport>,
    /// Assets in the correlation matrix, if one was computed
    pub correlated_assets: Option<usize>,
    pub failures: Vec<AssetFailure>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DetailedReport {
    pub points_added: usize,
    pub forecasts: Vec<Forecast>,
    pub failures: Vec<AssetFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub market: MarketCycleReport,
    pub analysis: AnalysisReport,
}

/// Run synchronous database work off the async workers
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {}", e)))?
}

/// Price points from a chart, with market cap and volume where the
/// timestamps line up
fn chart_points(asset_id: &str, chart: &MarketChart) -> Vec<PricePoint> {
    chart
        .price_series()
        .into_iter()
        .map(|(timestamp, price)| {
            let (market_cap, volume) = chart.companions_at(timestamp.timestamp_millis());
            PricePoint {
                asset_id: asset_id.to_string(),
                price,
                market_cap,
                volume,
                timestamp,
            }
        })
        .collect()
}

/// Pipeline service for business logic
pub struct PipelineService;

impl PipelineService {
    /// Asset ids in the tracked basket: the latest snapshot's assets, or the
    /// stored assets by market-cap rank before any snapshot was processed
    pub fn tracked_assets(state: &AppState) -> Result<Vec<String>> {
        let mut ids = state.market.latest_asset_ids();
        if ids.is_empty() {
            ids = state.sqlite.list_assets()?.into_iter().map(|a| a.id).collect();
        }
        ids.truncate(state.config.fetch.asset_count as usize);
        Ok(ids)
    }

    /// Fetch the market snapshot and process it
    pub async fn run_market_cycle(state: &AppState) -> MarketCycleReport {
        let fetched = state.market_client.markets(state.config.fetch.asset_count).await;

        match fetched.source {
            FetchSource::Default => {
                warn!("No market snapshot available, skipping processing");
                return MarketCycleReport {
                    source: fetched.source,
                    result: None,
                };
            }
            FetchSource::Stale => warn!("Provider unreachable, processing last good snapshot"),
            _ => {}
        }

        let market = state.market.clone();
        let snapshot = fetched.payload;
        let result = match blocking(move || Ok(market.process(&snapshot))).await {
            Ok(result) => Some(result),
            Err(e) => {
                error!("Market processing failed: {}", e);
                None
            }
        };

        MarketCycleReport {
            source: fetched.source,
            result,
        }
    }

    /// Indicators for every tracked asset, then the correlation matrix
    pub async fn run_analysis_cycle(state: &AppState) -> Result<AnalysisReport> {
        let ids = Self::tracked_assets(state)?;
        let window_days = state.config.indicators.window_days;

        let tasks = ids.iter().map(|id| {
            let service = state.indicators.clone();
            let id = id.clone();
            async move {
                let asset_id = id.clone();
                let result = blocking(move || service.calculate(&asset_id, window_days)).await;
                (id, result)
            }
        });

        let mut report = AnalysisReport::default();
        for (id, result) in join_all(tasks).await {
            match result {
                Ok(indicators) => report.indicators.push(indicators),
                Err(e) => {
                    error!("Indicator calculation failed for {}: {}", id, e);
                    report.failures.push(AssetFailure::new(&id, &e));
                }
            }
        }

        if ids.len() >= 2 {
            let service = state.correlations.clone();
            let window_days = state.config.correlation.window_days;
            let asset_ids = ids.clone();
            match blocking(move || service.calculate_correlations(&asset_ids, window_days)).await {
                Ok(matrix) => report.correlated_assets = Some(matrix.asset_ids.len()),
                Err(e) => error!("Correlation calculation failed: {}", e),
            }
        }

        info!(
            "Analysis cycle: {} assets, {} failures",
            report.indicators.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Pull each tracked asset's chart into history, refresh its profile and
    /// forecast it. Models are retrained only once stale.
    pub async fn run_detailed_cycle(state: &AppState) -> Result<DetailedReport> {
        let ids = Self::tracked_assets(state)?;
        let days = state.config.fetch.chart_days;

        let tasks = ids.iter().map(|id| {
            let client = state.market_client.clone();
            let sqlite = state.sqlite.clone();
            let duckdb = state.duckdb.clone();
            let forecasts = state.forecasts.clone();
            let id = id.clone();
            async move {
                let fetched = client.market_chart(&id, days).await;
                if fetched.source == FetchSource::Default {
                    warn!("No chart for {}, forecasting from stored history", id);
                }
                let points = chart_points(&id, &fetched.payload);

                let detail = client.asset_detail(&id).await;
                let profile = match detail.source {
                    FetchSource::Default => None,
                    _ => AssetProfile::from_detail(&detail.payload, Utc::now()),
                };

                let asset_id = id.clone();
                let result = blocking(move || {
                    if let Some(profile) = profile {
                        if let Err(e) = sqlite.upsert_asset_profile(&profile) {
                            error!("Failed to store profile for {}: {}", asset_id, e);
                        }
                    }
                    let added = duckdb.append_price_points(&points)?;
                    let forecast = forecasts.forecast_at(&asset_id, Utc::now())?;
                    Ok((added, forecast))
                })
                .await;
                (id, result)
            }
        });

        let mut report = DetailedReport::default();
        for (id, result) in join_all(tasks).await {
            match result {
                Ok((added, forecast)) => {
                    report.points_added += added;
                    report.forecasts.push(forecast);
                }
                Err(e) => {
                    error!("History refresh failed for {}: {}", id, e);
                    report.failures.push(AssetFailure::new(&id, &e));
                }
            }
        }

        info!(
            "Detailed cycle: {} new points, {} forecasts, {} failures",
            report.points_added,
            report.forecasts.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Delete price points older than the retention horizon
    pub async fn run_retention(state: &AppState) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(state.config.storage.retention_days as i64);
        let duckdb = state.duckdb.clone();
        let removed = blocking(move || duckdb.purge_before(cutoff)).await?;
        info!("Retention removed {} price points older than {}", removed, cutoff);
        Ok(removed)
    }

    /// Fetch, process and analyse once
    pub async fn run_cycle(state: &AppState) -> Result<CycleReport> {
        let market = Self::run_market_cycle(state).await;
        let analysis = Self::run_analysis_cycle(state).await?;
        Ok(CycleReport { market, analysis })
    }
}
