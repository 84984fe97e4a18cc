//! Scheduler module for Coinsight
//!
//! Handles the periodic pipeline jobs:
//! - Market snapshot fetch and processing
//! - Detailed history refresh and forecast retraining
//! - Indicator / correlation analysis
//! - Price history retention

mod pipeline_scheduler;

pub use pipeline_scheduler::PipelineScheduler;
