//! Per-hospital request throttle
//!
//! Fixed one-minute windows keyed by hospital code. Each call resets an
//! expired window, increments the counter and admits the call while the
//! counter is within the limit. Denied calls still count toward the window.
//! Nothing blocks or queues; the caller decides what to do with a denial.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

/// Length of one throttle window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Counter state for one scope
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    started_at: Instant,
}

impl RateWindow {
    fn new(now: Instant) -> Self {
        Self { count: 0, started_at: now }
    }

    fn roll(&mut self, now: Instant) {
        if now.saturating_duration_since(self.started_at) >= WINDOW {
            self.count = 0;
            self.started_at = now;
        }
    }
}

/// Registry of throttle windows, one per scope key
///
/// Cloning shares the underlying windows.
#[derive(Debug, Clone, Default)]
pub struct RateLimiterRegistry {
    windows: Arc<RwLock<HashMap<String, Arc<Mutex<RateWindow>>>>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a call against `scope` and reports whether it is admitted
    pub async fn allow(&self, scope: &str, limit: u32) -> bool {
        self.allow_at(scope, limit, Instant::now()).await
    }

    /// Same as [`allow`](Self::allow) with an explicit clock reading
    pub async fn allow_at(&self, scope: &str, limit: u32, now: Instant) -> bool {
        let window = self.window_for(scope, now).await;
        let mut window = window.lock().await;

        window.roll(now);
        window.count = window.count.saturating_add(1);
        window.count <= limit
    }

    /// Calls still available to `scope` in the current window
    pub async fn remaining(&self, scope: &str, limit: u32) -> u32 {
        let window = {
            let windows = self.windows.read().await;
            windows.get(scope).cloned()
        };

        match window {
            Some(window) => {
                let mut window = window.lock().await;
                window.roll(Instant::now());
                limit.saturating_sub(window.count)
            }
            None => limit,
        }
    }

    /// Number of scopes seen so far
    pub async fn scope_count(&self) -> usize {
        self.windows.read().await.len()
    }

    async fn window_for(&self, scope: &str, now: Instant) -> Arc<Mutex<RateWindow>> {
        if let Some(window) = self.windows.read().await.get(scope) {
            return Arc::clone(window);
        }

        let mut windows = self.windows.write().await;
        Arc::clone(
            windows
                .entry(scope.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(RateWindow::new(now)))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_admits_up_to_limit() {
        let limiter = RateLimiterRegistry::new();
        let now = Instant::now();

        for _ in 0..3 {
            assert!(limiter.allow_at("HOSP01", 3, now).await);
        }
        assert!(!limiter.allow_at("HOSP01", 3, now).await);
    }

    #[tokio::test]
    async fn test_zero_limit_denies_everything() {
        let limiter = RateLimiterRegistry::new();
        assert!(!limiter.allow("HOSP01", 0).await);
    }

    #[tokio::test]
    async fn test_window_resets_after_a_minute() {
        let limiter = RateLimiterRegistry::new();
        let start = Instant::now();

        assert!(limiter.allow_at("HOSP01", 1, start).await);
        assert!(!limiter.allow_at("HOSP01", 1, start + Duration::from_secs(59)).await);
        assert!(limiter.allow_at("HOSP01", 1, start + WINDOW).await);
    }

    #[tokio::test]
    async fn test_scopes_are_independent() {
        let limiter = RateLimiterRegistry::new();
        let now = Instant::now();

        assert!(limiter.allow_at("HOSP01", 1, now).await);
        assert!(limiter.allow_at("HOSP02", 1, now).await);
        assert!(!limiter.allow_at("HOSP01", 1, now).await);
        assert_eq!(limiter.scope_count().await, 2);
    }

    #[tokio::test]
    async fn test_remaining_budget() {
        let limiter = RateLimiterRegistry::new();
        assert_eq!(limiter.remaining("HOSP01", 5).await, 5);

        limiter.allow("HOSP01", 5).await;
        limiter.allow("HOSP01", 5).await;
        assert_eq!(limiter.remaining("HOSP01", 5).await, 3);
    }

    #[tokio::test]
    async fn test_clones_share_windows() {
        let limiter = RateLimiterRegistry::new();
        let shared = limiter.clone();

        assert!(limiter.allow("HOSP01", 1).await);
        assert!(!shared.allow("HOSP01", 1).await);
    }
}
