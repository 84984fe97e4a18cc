//! Services Layer
//!
//! Business logic behind the pipeline. Stateful services own their
//! collaborators and live in `AppState`; `PipelineService` drives them.
//!
//! # Architecture
//!
//! ```text
//! Scheduler ──> PipelineService ──> MarketService ──────┐
//!                                ├─> IndicatorService ──┼──> AlertService
//!                                ├─> CorrelationService │
//!                                └─> ForecastService    └──> SQLite / DuckDB / Broadcaster
//! ```
//!
//! # Services
//!
//! - `MarketService` - Snapshot processing and anomaly detection
//! - `AlertService` - Alert classification, dedup and queries
//! - `IndicatorService` - SMA / RSI / MACD and their interpretation
//! - `CorrelationService` - Pairwise correlation matrix
//! - `ForecastService` - Ensemble model cache and forecasts
//! - `PipelineService` - One pass of each periodic job

pub mod alert_service;
pub mod correlation_service;
pub mod forecast_service;
pub mod indicator_service;
pub mod market_service;
pub mod pipeline_service;

// Re-export commonly used types and services
pub use alert_service::AlertService;
pub use correlation_service::CorrelationService;
pub use forecast_service::ForecastService;
pub use indicator_service::{IndicatorReport, IndicatorService};
pub use market_service::{MarketService, ProcessResult};
pub use pipeline_service::{AnalysisReport, CycleReport, DetailedReport, MarketCycleReport, PipelineService};
