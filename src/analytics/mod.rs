//! Pure analytics over price series: indicators, correlation, forecasting

pub mod correlation;
pub mod forecast;
pub mod indicators;
