//! Process-wide sliding-window rate limiting for outbound Bungie API calls.
//!
//! One [`RateLimiter`] instance is shared by every connection through the
//! [`crate::client::ApiClient`]. Admission is suspend-until-safe: callers
//! are paced, never dropped, and the admission order follows lock
//! acquisition order. The window is a rolling interval, not a calendar
//! bucket — at no instant may more than `max_calls` admissions fall inside
//! any trailing `window`-length interval.
//!
//! The wait path is an explicit loop: sleep until the oldest retained
//! admission exits the window, then re-evaluate from scratch. The recheck
//! is load-bearing under contention — another caller may have taken the
//! freed slot while this one slept.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

/// Configuration for the sliding-window rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum admissions per rolling window.
    pub max_calls: usize,
    /// Window duration.
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_calls: 25,
            window: Duration::from_millis(10_000),
        }
    }
}

impl RateLimiterConfig {
    /// Load configuration from environment variables.
    ///
    /// - `VANGUARD_RATE_LIMIT_MAX` (default: 25)
    /// - `VANGUARD_RATE_LIMIT_WINDOW_MS` (default: 10000)
    ///
    /// Invalid or zero values are logged and replaced by the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("VANGUARD_RATE_LIMIT_MAX") {
            match val.parse::<usize>() {
                Ok(max) if max > 0 => config.max_calls = max,
                _ => {
                    warn!(
                        env_var = "VANGUARD_RATE_LIMIT_MAX",
                        value = %val,
                        default = 25usize,
                        "Invalid value for environment variable, using default"
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("VANGUARD_RATE_LIMIT_WINDOW_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => config.window = Duration::from_millis(ms),
                _ => {
                    warn!(
                        env_var = "VANGUARD_RATE_LIMIT_WINDOW_MS",
                        value = %val,
                        default = 10_000u64,
                        "Invalid value for environment variable, using default"
                    );
                }
            }
        }

        config
    }
}

/// Sliding-window admission controller.
///
/// Owns the window state exclusively; the only mutation paths are
/// [`RateLimiter::acquire`] and the lazy prune it performs. Introspection
/// ([`RateLimiter::remaining`], [`RateLimiter::reset_in`]) computes against
/// the same pruning rule without mutating anything.
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    admissions: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter from the given configuration.
    ///
    /// A zero `max_calls` would never admit anything; it is clamped to 1
    /// (and `from_env` already rejects zero).
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            max_calls: config.max_calls.max(1),
            window: config.window,
            admissions: Mutex::new(VecDeque::new()),
        }
    }

    /// Suspend until admission is safe, then record it and return.
    ///
    /// Never fails and never skips a caller: each pass prunes timestamps
    /// older than the window, admits if a slot is free, and otherwise
    /// sleeps until the oldest retained timestamp leaves the window before
    /// re-evaluating.
    pub async fn acquire(&self) {
        loop {
            let wake_at = {
                let mut admissions = self.admissions.lock().await;
                let now = Instant::now();

                while let Some(&oldest) = admissions.front() {
                    if now.duration_since(oldest) >= self.window {
                        admissions.pop_front();
                    } else {
                        break;
                    }
                }

                if admissions.len() < self.max_calls {
                    admissions.push_back(now);
                    return;
                }

                match admissions.front() {
                    Some(&oldest) => oldest + self.window,
                    // Unreachable with max_calls >= 1, but a spurious wake
                    // costs one extra loop pass, not correctness.
                    None => now,
                }
            };

            tokio::time::sleep_until(wake_at).await;
            // Re-evaluate from scratch: the freed slot may already be gone.
        }
    }

    /// Number of admission slots currently free in the window.
    pub async fn remaining(&self) -> usize {
        let admissions = self.admissions.lock().await;
        let now = Instant::now();
        let live = admissions
            .iter()
            .filter(|&&t| now.duration_since(t) < self.window)
            .count();
        self.max_calls.saturating_sub(live)
    }

    /// Time until the oldest retained admission leaves the window.
    ///
    /// Zero when the window holds no live admissions.
    pub async fn reset_in(&self) -> Duration {
        let admissions = self.admissions.lock().await;
        let now = Instant::now();
        admissions
            .iter()
            .find(|&&t| now.duration_since(t) < self.window)
            .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Maximum admissions per window, as configured.
    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    /// Window duration, as configured.
    pub fn window(&self) -> Duration {
        self.window
    }
}
