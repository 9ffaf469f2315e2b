//! Persisted counter-window rate limiting.
//!
//! Each key gets a fixed window: the first attempt opens it, later attempts
//! increment the counter until the window expires. Windows live in the local
//! store so they survive restarts of a single-user process.
//!
//! The limiter fails open: if the store cannot be read or written, attempts
//! are allowed and a warning is logged.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::LocalStore;

const KEY_PREFIX: &str = "swatchbook.ratelimit.";

/// Limits for one category of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Attempts allowed per window.
    pub max_attempts: u32,
    /// Window length, measured from the first attempt.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Attempts counted in the current window, including this one.
    pub count: u32,
    /// Attempts left before denial.
    pub remaining: u32,
    /// When the current window expires.
    pub reset_at: DateTime<Utc>,
}

/// Stored window state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateWindow {
    count: u32,
    reset_time: DateTime<Utc>,
}

/// Keyed attempt limiter backed by a [`LocalStore`].
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn LocalStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub const fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Record an attempt for `key` now.
    #[must_use]
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Utc::now())
    }

    /// Record an attempt for `key` at `now`.
    #[must_use]
    pub fn check_at(&self, key: &str, now: DateTime<Utc>) -> RateDecision {
        let storage_key = storage_key(key);

        let current = match self.store.get(&storage_key) {
            Ok(raw) => raw.and_then(|raw| serde_json::from_str::<RateWindow>(&raw).ok()),
            Err(e) => {
                warn!(error = %e, key, "rate limit store unreadable, allowing attempt");
                return self.open_window(now);
            }
        };

        let window = match current {
            Some(mut window) if now <= window.reset_time => {
                window.count = window.count.saturating_add(1);
                window
            }
            _ => RateWindow {
                count: 1,
                reset_time: self.window_end(now),
            },
        };

        let decision = self.decide(&window);
        match serde_json::to_string(&window) {
            Ok(raw) => {
                if let Err(e) = self.store.set(&storage_key, &raw) {
                    warn!(error = %e, key, "rate limit store unwritable, allowing attempt");
                    return self.open_window(now);
                }
            }
            Err(e) => warn!(error = %e, key, "failed to encode rate window"),
        }

        if !decision.allowed {
            debug!(key, count = decision.count, "rate limit exceeded");
        }
        decision
    }

    /// Clear the window for `key`, typically after a successful attempt.
    pub fn reset(&self, key: &str) {
        if let Err(e) = self.store.remove(&storage_key(key)) {
            warn!(error = %e, key, "failed to reset rate limit window");
        }
    }

    fn decide(&self, window: &RateWindow) -> RateDecision {
        RateDecision {
            allowed: window.count <= self.config.max_attempts,
            count: window.count,
            remaining: self.config.max_attempts.saturating_sub(window.count),
            reset_at: window.reset_time,
        }
    }

    fn open_window(&self, now: DateTime<Utc>) -> RateDecision {
        self.decide(&RateWindow {
            count: 1,
            reset_time: self.window_end(now),
        })
    }

    fn window_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window = TimeDelta::from_std(self.config.window).unwrap_or(TimeDelta::MAX);
        now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

fn storage_key(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}
