//! Integration tests for the persisted rate limiter.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};

use swatchbook::rate_limit::{RateLimitConfig, RateLimiter};
use swatchbook::store::{FileStore, MemoryStore};

fn config(max_attempts: u32) -> RateLimitConfig {
    RateLimitConfig {
        max_attempts,
        window: Duration::from_secs(60),
    }
}

#[test]
fn test_boundary_and_window_expiry() {
    let limiter = RateLimiter::new(Arc::new(MemoryStore::new()), config(3));
    let start = Utc::now();

    for expected in 1..=3 {
        let decision = limiter.check_at("login:a@ex.com", start);
        assert!(decision.allowed);
        assert_eq!(decision.count, expected);
        assert_eq!(decision.remaining, 3 - expected);
    }

    let denied = limiter.check_at("login:a@ex.com", start + TimeDelta::seconds(30));
    assert!(!denied.allowed);
    assert_eq!(denied.remaining, 0);
    assert_eq!(denied.reset_at, start + TimeDelta::seconds(60));

    let after = limiter.check_at("login:a@ex.com", start + TimeDelta::seconds(61));
    assert!(after.allowed);
    assert_eq!(after.count, 1);
    assert_eq!(after.remaining, 2);
}

#[test]
fn test_reset_clears_window() {
    let limiter = RateLimiter::new(Arc::new(MemoryStore::new()), config(1));

    assert!(limiter.check("k").allowed);
    assert!(!limiter.check("k").allowed);

    limiter.reset("k");
    assert!(limiter.check("k").allowed);
}

#[test]
fn test_fails_open_when_store_unavailable() {
    let limiter = RateLimiter::new(Arc::new(MemoryStore::unavailable()), config(1));

    for _ in 0..5 {
        assert!(limiter.check("k").allowed);
    }
}

#[test]
fn test_windows_persist_across_limiters() {
    let dir = std::env::temp_dir().join(format!("swatchbook-ratelimit-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let store = Arc::new(FileStore::new(&dir));

    let first = RateLimiter::new(store.clone(), config(2));
    assert!(first.check("k").allowed);
    assert!(first.check("k").allowed);

    // A new limiter over the same directory sees the stored window.
    let second = RateLimiter::new(Arc::new(FileStore::new(&dir)), config(2));
    assert!(!second.check("k").allowed);

    second.reset("k");
    assert!(first.check("k").allowed);

    let _ = std::fs::remove_dir_all(&dir);
}
