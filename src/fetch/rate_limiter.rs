//! Sliding-window rate limiter shared by every provider call
//!
//! At most `max_requests` admissions fall inside any rolling `window`.
//! Callers that arrive at the ceiling wait in a FIFO queue; a single drainer
//! task wakes when the oldest admission leaves the window and admits queued
//! callers in arrival order.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

#[derive(Debug)]
struct LimiterState {
    /// Admission times inside the current window, oldest first
    admitted: VecDeque<Instant>,
    /// Callers waiting for capacity, in arrival order
    waiters: VecDeque<oneshot::Sender<()>>,
    /// Whether a drainer task is running
    draining: bool,
}

impl LimiterState {
    fn evict(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.admitted.front() {
            if now.duration_since(*oldest) >= window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

#[derive(Debug)]
struct LimiterInner {
    max_requests: usize,
    window: Duration,
    state: Mutex<LimiterState>,
}

/// Rate limiter handle; clones share the same window
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<LimiterInner>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_requests` per rolling `window`
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            inner: Arc::new(LimiterInner {
                max_requests: max_requests.max(1) as usize,
                window,
                state: Mutex::new(LimiterState {
                    admitted: VecDeque::new(),
                    waiters: VecDeque::new(),
                    draining: false,
                }),
            }),
        }
    }

    /// Wait until the call may proceed
    pub async fn acquire(&self) {
        let receiver = {
            let mut state = self.inner.state.lock();
            let now = Instant::now();
            state.evict(now, self.inner.window);

            if state.waiters.is_empty() && state.admitted.len() < self.inner.max_requests {
                state.admitted.push_back(now);
                return;
            }

            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            tracing::debug!(
                "Rate limit reached ({} in window), queued at position {}",
                state.admitted.len(),
                state.waiters.len()
            );

            if !state.draining {
                state.draining = true;
                tokio::spawn(drain(self.inner.clone()));
            }
            rx
        };

        // The drainer never drops a sender without sending
        let _ = receiver.await;
    }

    /// Admit immediately if capacity is free and nobody is queued
    pub fn try_acquire(&self) -> bool {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        state.evict(now, self.inner.window);

        if state.waiters.is_empty() && state.admitted.len() < self.inner.max_requests {
            state.admitted.push_back(now);
            true
        } else {
            false
        }
    }

    /// Time until the oldest admission leaves the window
    pub fn time_until_available(&self) -> Duration {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        state.evict(now, self.inner.window);

        if state.admitted.len() < self.inner.max_requests {
            return Duration::ZERO;
        }
        state
            .admitted
            .front()
            .map(|oldest| (*oldest + self.inner.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Callers currently waiting
    pub fn queued(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }
}

/// Admit queued callers as capacity frees up; exits once the queue is empty
async fn drain(inner: Arc<LimiterInner>) {
    loop {
        let wait = {
            let mut state = inner.state.lock();
            let now = Instant::now();
            state.evict(now, inner.window);

            while state.admitted.len() < inner.max_requests {
                match state.waiters.pop_front() {
                    // A dropped receiver means the caller gave up; it takes no slot
                    Some(tx) => {
                        if tx.send(()).is_ok() {
                            state.admitted.push_back(now);
                        }
                    }
                    None => break,
                }
            }

            if state.waiters.is_empty() {
                state.draining = false;
                return;
            }

            match state.admitted.front() {
                Some(oldest) => (*oldest + inner.window).saturating_duration_since(now),
                None => Duration::ZERO,
            }
        };

        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_ceiling() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.time_until_available(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_returns_after_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_callers_served_fifo() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for id in 0..5 {
            let limiter = limiter.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                order.lock().push(id);
            }));
            // Let the task register before spawning the next one
            tokio::task::yield_now().await;
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_holds_in_every_rolling_window() {
        let window = Duration::from_secs(10);
        let limiter = RateLimiter::new(3, window);
        let admitted = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..12 {
            let limiter = limiter.clone();
            let admitted = admitted.clone();
            handles.push(tokio::spawn(async move {
                // Stagger arrivals so windows overlap unevenly
                tokio::time::sleep(Duration::from_millis(700 * i)).await;
                limiter.acquire().await;
                admitted.lock().push(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut times = admitted.lock().clone();
        times.sort();
        assert_eq!(times.len(), 12);
        for start in &times {
            let in_window = times
                .iter()
                .filter(|t| **t >= *start && t.duration_since(*start) < window)
                .count();
            assert!(in_window <= 3, "{} admissions within one window", in_window);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_waiter_takes_no_slot() {
        let limiter = RateLimiter::new(1, Duration::from_secs(5));
        limiter.acquire().await;

        // Caller gives up before capacity frees
        let abandoned = tokio::time::timeout(Duration::from_secs(1), limiter.acquire()).await;
        assert!(abandoned.is_err());

        let start = Instant::now();
        limiter.acquire().await;
        assert!(Instant::now().duration_since(start) <= Duration::from_secs(5));
        assert_eq!(limiter.queued(), 0);
    }
}
