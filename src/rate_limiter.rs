//! Per-user sliding-window rate limiting over a minute and an hour window.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio::time::interval;
use tracing::warn;

use crate::config::RateLimiterConfig;
use crate::types::{PolicyConstraints, RateLimitState, WindowCounter};

const MINUTE_WIDTH: Duration = Duration::from_secs(60);
const HOUR_WIDTH: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct RateLimitCheck {
    pub allowed: bool,
    pub reason: Option<String>,
    pub minute_remaining: u32,
    pub hour_remaining: u32,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Checks without mutating. Fails open on internal error.
    async fn check(&self, user_id: &str, limits: &PolicyConstraints) -> RateLimitCheck;
    /// Bumps both windows by exactly one, updating `lastUpdated`.
    async fn increment(&self, user_id: &str);
    /// Stops any background sweeper owned by this limiter. No-op for
    /// implementations that don't run one.
    fn shutdown(&self) {}
}

pub struct InMemoryRateLimiter {
    config: RateLimiterConfig,
    states: Arc<DashMap<String, RateLimitState>>,
    shutdown_notify: Arc<Notify>,
    is_running: Arc<parking_lot::RwLock<bool>>,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            states: Arc::new(DashMap::new()),
            shutdown_notify: Arc::new(Notify::new()),
            is_running: Arc::new(parking_lot::RwLock::new(true)),
        }
    }

    /// Removes per-user entries untouched for longer than `memory_ttl`.
    pub fn start_sweeper(&self) {
        let states = self.states.clone();
        let shutdown_notify = self.shutdown_notify.clone();
        let is_running = self.is_running.clone();
        let cleanup_interval = self.config.cleanup_interval;
        let memory_ttl = self.config.memory_ttl;

        tokio::spawn(async move {
            let mut ticker = interval(cleanup_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !*is_running.read() {
                            break;
                        }
                        let now = SystemTime::now();
                        states.retain(|_, state| {
                            now.duration_since(state.last_updated).unwrap_or_default() < memory_ttl
                        });
                    }
                    _ = shutdown_notify.notified() => break,
                }
            }
        });
    }

    pub fn shutdown(&self) {
        *self.is_running.write() = false;
        self.shutdown_notify.notify_waiters();
    }

    fn reset_if_expired(counter: &mut WindowCounter, width: Duration, now: SystemTime) {
        if now.duration_since(counter.window_start).unwrap_or_default() >= width {
            *counter = WindowCounter::fresh(now);
        }
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, user_id: &str, limits: &PolicyConstraints) -> RateLimitCheck {
        let now = SystemTime::now();
        let mut entry = self
            .states
            .entry(user_id.to_string())
            .or_insert_with(|| RateLimitState::fresh(now));

        Self::reset_if_expired(&mut entry.minute, MINUTE_WIDTH, now);
        Self::reset_if_expired(&mut entry.hour, HOUR_WIDTH, now);

        let rate_limit = &limits.rate_limit;
        if entry.minute.count >= rate_limit.per_minute {
            return RateLimitCheck {
                allowed: false,
                reason: Some(format!(
                    "{} requests per minute exceeded",
                    rate_limit.per_minute
                )),
                minute_remaining: 0,
                hour_remaining: rate_limit.hour_remaining(entry.hour.count),
            };
        }
        if entry.hour.count >= rate_limit.per_hour {
            return RateLimitCheck {
                allowed: false,
                reason: Some(format!("{} requests per hour exceeded", rate_limit.per_hour)),
                minute_remaining: rate_limit.minute_remaining(entry.minute.count),
                hour_remaining: 0,
            };
        }

        RateLimitCheck {
            allowed: true,
            reason: None,
            minute_remaining: rate_limit.minute_remaining(entry.minute.count),
            hour_remaining: rate_limit.hour_remaining(entry.hour.count),
        }
    }

    async fn increment(&self, user_id: &str) {
        let now = SystemTime::now();
        let mut entry = self
            .states
            .entry(user_id.to_string())
            .or_insert_with(|| RateLimitState::fresh(now));

        Self::reset_if_expired(&mut entry.minute, MINUTE_WIDTH, now);
        Self::reset_if_expired(&mut entry.hour, HOUR_WIDTH, now);

        entry.minute.count += 1;
        entry.hour.count += 1;
        entry.last_updated = now;
    }

    fn shutdown(&self) {
        InMemoryRateLimiter::shutdown(self)
    }
}

trait RemainingExt {
    fn minute_remaining(&self, used: u32) -> u32;
    fn hour_remaining(&self, used: u32) -> u32;
}

impl RemainingExt for crate::types::RateLimit {
    fn minute_remaining(&self, used: u32) -> u32 {
        self.per_minute.saturating_sub(used)
    }
    fn hour_remaining(&self, used: u32) -> u32 {
        self.per_hour.saturating_sub(used)
    }
}

/// Runs `check` against `limiter`, logging and allowing on any internal
/// panic: an internal rate-limiter failure must never block a request.
pub async fn fail_open_check(
    limiter: &dyn RateLimiter,
    user_id: &str,
    limits: &PolicyConstraints,
) -> RateLimitCheck {
    let result = std::panic::AssertUnwindSafe(limiter.check(user_id, limits))
        .catch_unwind()
        .await;
    match result {
        Ok(check) => check,
        Err(_) => {
            warn!(user_id = %user_id, "rate limiter check panicked, failing open");
            RateLimitCheck {
                allowed: true,
                reason: None,
                minute_remaining: limits.rate_limit.per_minute,
                hour_remaining: limits.rate_limit.per_hour,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RateLimit, UserTier};

    fn limits(per_minute: u32, per_hour: u32) -> PolicyConstraints {
        let mut constraints = UserTier::Free.default_constraints();
        constraints.rate_limit = RateLimit { per_minute, per_hour };
        constraints
    }

    #[tokio::test]
    async fn allows_then_denies_at_minute_cap() {
        let limiter = InMemoryRateLimiter::new(RateLimiterConfig::default());
        let limits = limits(2, 100);

        assert!(limiter.check("u1", &limits).await.allowed);
        limiter.increment("u1").await;
        assert!(limiter.check("u1", &limits).await.allowed);
        limiter.increment("u1").await;

        let third = limiter.check("u1", &limits).await;
        assert!(!third.allowed);
        assert!(third.reason.unwrap().contains("2 requests per minute"));
    }

    #[tokio::test]
    async fn denial_does_not_increment_via_check_alone() {
        let limiter = InMemoryRateLimiter::new(RateLimiterConfig::default());
        let limits = limits(1, 100);

        limiter.increment("u1").await;
        limiter.check("u1", &limits).await;
        limiter.check("u1", &limits).await;

        let entry = limiter.states.get("u1").unwrap();
        assert_eq!(entry.minute.count, 1);
    }

    #[tokio::test]
    async fn increment_bumps_both_windows_by_one() {
        let limiter = InMemoryRateLimiter::new(RateLimiterConfig::default());
        limiter.increment("u1").await;
        let entry = limiter.states.get("u1").unwrap();
        assert_eq!(entry.minute.count, 1);
        assert_eq!(entry.hour.count, 1);
    }
}
