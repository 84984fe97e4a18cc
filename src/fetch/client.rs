//! Cached, rate-limited, retrying fetch client
//!
//! ```text
//! IDLE ──> CACHE_HIT (return)
//!   └────> [RATE_LIMITED ─> QUEUED ─>] FETCHING ──> SUCCESS
//!                                        │   └────> RETRYING ─> FETCHING
//!                                        └────────> EXHAUSTED ─> FALLBACK (stale | default)
//! ```
//!
//! Concurrent misses on one key share a single in-flight request.

use crate::error::{AppError, Result};
use crate::fetch::cache::TtlCache;
use crate::fetch::rate_limiter::RateLimiter;
use crate::fetch::retry::RetryPolicy;
use crate::providers::{MarketDataProvider, ProviderPool};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a fetched payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    /// Fresh cache entry, no provider call
    Cache,
    /// Provider call succeeded
    Network,
    /// Provider failed; last cached payload served past its TTL
    Stale,
    /// Provider failed and nothing was cached; empty payload
    Default,
}

/// Payload plus its provenance
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub payload: T,
    pub source: FetchSource,
}

impl<T> Fetched<T> {
    /// True when the provider could not be reached for this payload
    pub fn is_degraded(&self) -> bool {
        matches!(self.source, FetchSource::Stale | FetchSource::Default)
    }
}

type SharedFetch = Shared<BoxFuture<'static, Fetched<Option<Value>>>>;

struct FetchInner {
    pool: Arc<ProviderPool>,
    cache: TtlCache,
    limiter: RateLimiter,
    retry: RetryPolicy,
    inflight: Mutex<HashMap<String, SharedFetch>>,
}

/// Fetch client handle; clones share cache, limiter and pool
#[derive(Clone)]
pub struct FetchClient {
    inner: Arc<FetchInner>,
}

impl FetchClient {
    pub fn new(pool: Arc<ProviderPool>, limiter: RateLimiter, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(FetchInner {
                pool,
                cache: TtlCache::new(),
                limiter,
                retry,
                inflight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Fetch `key` through the cache, limiter and retry policy.
    ///
    /// Never fails: an unreachable provider yields the last cached payload,
    /// or `T::default()` when nothing was ever cached.
    pub async fn fetch<T, F, Fut>(&self, key: &str, ttl: Duration, call: F) -> Fetched<T>
    where
        T: Serialize + DeserializeOwned + Default + Send + 'static,
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(payload) = self.inner.cache.get_fresh(key) {
            debug!("Cache hit for {}", key);
            return decode(
                key,
                Fetched {
                    payload: Some(payload),
                    source: FetchSource::Cache,
                },
            );
        }

        let shared = {
            let mut inflight = self.inner.inflight.lock();
            if let Some(existing) = inflight.get(key) {
                debug!("Joining in-flight fetch for {}", key);
                existing.clone()
            } else if let Some(payload) = self.inner.cache.get_fresh(key) {
                // Another caller finished between the first check and the lock
                return decode(
                    key,
                    Fetched {
                        payload: Some(payload),
                        source: FetchSource::Cache,
                    },
                );
            } else {
                let inner = self.inner.clone();
                let owned_key = key.to_string();
                let future = async move { inner.fetch_uncached(owned_key, ttl, call).await }
                    .boxed()
                    .shared();
                inflight.insert(key.to_string(), future.clone());
                future
            }
        };

        decode(key, shared.await)
    }

    pub fn pool(&self) -> &Arc<ProviderPool> {
        &self.inner.pool
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    /// Drop the cached payload for a key
    pub fn invalidate(&self, key: &str) {
        self.inner.cache.invalidate(key);
    }

    pub fn cached_entries(&self) -> usize {
        self.inner.cache.len()
    }
}

impl FetchInner {
    async fn fetch_uncached<T, F, Fut>(self: Arc<Self>, key: String, ttl: Duration, call: F) -> Fetched<Option<Value>>
    where
        T: Serialize + Send + 'static,
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let outcome = self.fetch_with_retry(&key, ttl, &call).await;
        self.inflight.lock().remove(&key);
        outcome
    }

    async fn fetch_with_retry<T, F, Fut>(&self, key: &str, ttl: Duration, call: &F) -> Fetched<Option<Value>>
    where
        T: Serialize,
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut + Sync,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;

        loop {
            self.limiter.acquire().await;

            let provider = self.pool.current();
            let result = call(provider.clone())
                .await
                .and_then(|payload| serde_json::to_value(&payload).map_err(AppError::from));

            match result {
                Ok(value) => {
                    self.cache.insert(key, value.clone(), ttl);
                    if attempt > 0 {
                        info!("Fetched {} from {} after {} retries", key, provider.id(), attempt);
                    } else {
                        debug!("Fetched {} from {}", key, provider.id());
                    }
                    return Fetched {
                        payload: Some(value),
                        source: FetchSource::Network,
                    };
                }
                Err(err) => {
                    if err.triggers_failover() {
                        self.pool.failover();
                    }

                    if !err.is_retryable() || attempt >= self.retry.max_retries {
                        warn!(
                            "Fetch {} gave up after {} attempt(s) [{}]: {}",
                            key,
                            attempt + 1,
                            err.code(),
                            err
                        );
                        return self.fallback(key);
                    }

                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Fetch {} failed [{}]: {}; retry {}/{} in {:?}",
                        key,
                        err.code(),
                        err,
                        attempt,
                        self.retry.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn fallback(&self, key: &str) -> Fetched<Option<Value>> {
        match self.cache.get_any(key) {
            Some(payload) => {
                warn!("Serving stale cache for {}", key);
                Fetched {
                    payload: Some(payload),
                    source: FetchSource::Stale,
                }
            }
            None => {
                warn!("Nothing cached for {}, returning empty payload", key);
                Fetched {
                    payload: None,
                    source: FetchSource::Default,
                }
            }
        }
    }
}

fn decode<T: DeserializeOwned + Default>(key: &str, fetched: Fetched<Option<Value>>) -> Fetched<T> {
    match fetched.payload {
        Some(value) => match serde_json::from_value::<T>(value) {
            Ok(payload) => Fetched {
                payload,
                source: fetched.source,
            },
            Err(e) => {
                warn!("Cached payload for {} no longer decodes: {}", key, e);
                Fetched {
                    payload: T::default(),
                    source: FetchSource::Default,
                }
            }
        },
        None => Fetched {
            payload: T::default(),
            source: fetched.source,
        },
    }
}
