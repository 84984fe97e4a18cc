//! Outbound data fetching: cache, rate limiting, retry and failover

pub mod cache;
pub mod client;
pub mod market_client;
pub mod rate_limiter;
pub mod retry;

pub use client::{FetchClient, FetchSource, Fetched};
pub use market_client::MarketDataClient;
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
