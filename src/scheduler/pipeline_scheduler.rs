//! Interval timers for the pipeline jobs
//!
//! Each job runs on its own `tokio::time::interval`. A tick spawns the job as
//! a separate task, so `stop()` cancels future ticks while work already in
//! flight (including scheduled retries) runs to completion.

use crate::services::PipelineService;
use crate::state::AppState;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Owns the timer loops of a running pipeline
pub struct PipelineScheduler {
    state: Arc<AppState>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PipelineScheduler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Start every timer loop; a second call while running is ignored
    pub fn start(&self) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            warn!("Pipeline scheduler already running");
            return;
        }

        let fetch = &self.state.config.fetch;
        let storage = &self.state.config.storage;

        handles.push(spawn_loop(
            "market",
            Duration::from_secs(fetch.fetch_interval_secs),
            self.state.clone(),
            |state| async move {
                PipelineService::run_market_cycle(&state).await;
            },
        ));
        handles.push(spawn_loop(
            "detailed",
            Duration::from_secs(fetch.detailed_fetch_interval_secs),
            self.state.clone(),
            |state| async move {
                if let Err(e) = PipelineService::run_detailed_cycle(&state).await {
                    error!("Detailed cycle failed: {}", e);
                }
            },
        ));
        handles.push(spawn_loop(
            "analysis",
            Duration::from_secs(fetch.analysis_interval_secs),
            self.state.clone(),
            |state| async move {
                if let Err(e) = PipelineService::run_analysis_cycle(&state).await {
                    error!("Analysis cycle failed: {}", e);
                }
            },
        ));
        handles.push(spawn_loop(
            "retention",
            Duration::from_secs(storage.retention_interval_secs),
            self.state.clone(),
            |state| async move {
                if let Err(e) = PipelineService::run_retention(&state).await {
                    error!("Retention failed: {}", e);
                }
            },
        ));

        info!(
            "Pipeline scheduler started (market every {}s, detailed every {}s, analysis every {}s)",
            fetch.fetch_interval_secs, fetch.detailed_fetch_interval_secs, fetch.analysis_interval_secs
        );
    }

    /// Cancel the timer loops
    pub fn stop(&self) {
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        if handles.is_empty() {
            return;
        }
        for handle in handles {
            handle.abort();
        }
        info!("Pipeline scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.handles.lock().is_empty()
    }
}

impl Drop for PipelineScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_loop<F, Fut>(name: &'static str, period: Duration, state: Arc<AppState>, job: F) -> JoinHandle<()>
where
    F: Fn(Arc<AppState>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            debug!("{} tick", name);
            tokio::spawn(job(state.clone()));
        }
    })
}
