//! Backoff schedule for transient E-Klaim failures
//!
//! Delays double from `base_delay` on each attempt and are capped at
//! `max_delay`. No jitter: the remote service expects the 1 s, 2 s, 4 s
//! cadence and tests pin it.

use std::time::Duration;

/// Exponential backoff settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt (default: 1s)
    pub base_delay: Duration,
    /// Upper bound for any single delay (default: 30s)
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}
