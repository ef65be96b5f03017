use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::ClockRef;
use crate::error::{CirisError, Result};
use crate::telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(CirisError::config("rate limit max_requests must be > 0"));
        }
        if self.window.is_zero() {
            return Err(CirisError::config("rate limit window must be > 0"));
        }
        if chrono::Duration::from_std(self.window).is_err() {
            return Err(CirisError::config("rate limit window is out of range"));
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(1))
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
    pub retry_after: Option<Duration>,
}

impl RateLimitDecision {
    pub fn allowed(limit: u32, remaining: u32, reset_after: Duration) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_after,
            retry_after: None,
        }
    }

    pub fn limited(limit: u32, reset_after: Duration) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_after,
            retry_after: Some(reset_after),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    window_start: DateTime<Utc>,
    count: u32,
}

type WindowSlot = Arc<Mutex<Option<RateWindow>>>;

/// Fixed-window request throttle with one window per key.
///
/// `acquire` never fails: over the limit it waits for the window to roll.
/// Callers on the same key are admitted in arrival order.
pub struct RateLimiter {
    config: RateLimitConfig,
    window: chrono::Duration,
    clock: ClockRef,
    windows: StdMutex<HashMap<String, WindowSlot>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: ClockRef) -> Result<Self> {
        config.validate()?;
        let window = chrono::Duration::from_std(config.window)
            .map_err(|_| CirisError::config("rate limit window is out of range"))?;
        Ok(Self {
            config,
            window,
            clock,
            windows: StdMutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    fn slot(&self, key: &str) -> WindowSlot {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    fn admit(&self, window: &mut Option<RateWindow>, now: DateTime<Utc>) -> RateLimitDecision {
        let mut current = match *window {
            Some(w) if now < w.window_start + self.window => w,
            _ => RateWindow {
                window_start: now,
                count: 0,
            },
        };
        let reset_after = (current.window_start + self.window - now)
            .to_std()
            .unwrap_or(Duration::ZERO);

        let limit = self.config.max_requests;
        let decision = if current.count < limit {
            current.count += 1;
            RateLimitDecision::allowed(limit, limit - current.count, reset_after)
        } else {
            RateLimitDecision::limited(limit, reset_after)
        };
        *window = Some(current);
        decision
    }

    /// Non-blocking admission check. Denied while other callers are queued on the key.
    pub fn try_acquire(&self, key: &str) -> RateLimitDecision {
        let slot = self.slot(key);
        let Ok(mut window) = slot.try_lock() else {
            return RateLimitDecision::limited(self.config.max_requests, self.config.window);
        };
        self.admit(&mut window, self.clock.now())
    }

    /// Wait until a request for `key` fits under the limit.
    pub async fn acquire(&self, key: &str) {
        let slot = self.slot(key);
        let mut window = slot.lock().await;
        loop {
            let decision = self.admit(&mut window, self.clock.now());
            if decision.allowed {
                return;
            }
            let delay = decision
                .retry_after
                .unwrap_or(self.config.window)
                .max(Duration::from_millis(1));
            debug!(key, delay_ms = delay.as_millis() as u64, "rate limit reached; waiting");
            telemetry::record_rate_limit_wait(key);
            self.clock.sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use futures_util::future::join_all;

    fn limiter(max: u32, window_ms: u64) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::default();
        let limiter = RateLimiter::new(
            RateLimitConfig::new(max, Duration::from_millis(window_ms)),
            Arc::new(clock.clone()),
        )
        .expect("limiter");
        (limiter, clock)
    }

    #[test]
    fn construction_rejects_invalid_config() {
        let clock: ClockRef = Arc::new(ManualClock::default());
        let zero_requests = RateLimiter::new(RateLimitConfig::new(0, Duration::from_secs(1)), clock.clone());
        assert!(matches!(zero_requests, Err(CirisError::Config(_))));

        let zero_window = RateLimiter::new(RateLimitConfig::new(5, Duration::ZERO), clock);
        assert!(matches!(zero_window, Err(CirisError::Config(_))));
    }

    #[tokio::test]
    async fn eleventh_request_waits_for_window_boundary() {
        let (limiter, clock) = limiter(10, 1000);
        let start = clock.now();

        for _ in 0..10 {
            limiter.acquire("GET /v1/agent").await;
        }
        assert_eq!(clock.now(), start, "first ten are admitted immediately");

        limiter.acquire("GET /v1/agent").await;
        assert!(clock.now() >= start + chrono::Duration::milliseconds(1000));
    }

    #[tokio::test]
    async fn keys_have_independent_windows() {
        let (limiter, clock) = limiter(2, 1000);
        let start = clock.now();

        limiter.acquire("POST /v1/memory").await;
        limiter.acquire("POST /v1/memory").await;
        let denied = limiter.try_acquire("POST /v1/memory");
        assert!(!denied.allowed);

        limiter.acquire("GET /v1/system").await;
        limiter.acquire("GET /v1/system").await;
        assert_eq!(clock.now(), start, "other key was not delayed");
    }

    #[tokio::test]
    async fn same_key_waiters_are_served_in_arrival_order() {
        let (limiter, _clock) = limiter(1, 100);
        let order = Arc::new(StdMutex::new(Vec::new()));

        let waiters = (0..4).map(|i| {
            let limiter = &limiter;
            let order = order.clone();
            async move {
                limiter.acquire("GET /v1/telemetry").await;
                order.lock().expect("lock").push(i);
            }
        });
        join_all(waiters).await;

        assert_eq!(*order.lock().expect("lock"), vec![0, 1, 2, 3]);
    }

    #[test]
    fn try_acquire_reports_remaining_and_reset() {
        let (limiter, clock) = limiter(2, 1000);

        let first = limiter.try_acquire("k");
        assert!(first.allowed);
        assert_eq!(first.limit, 2);
        assert_eq!(first.remaining, 1);
        assert_eq!(first.reset_after, Duration::from_secs(1));

        clock.advance(Duration::from_millis(400));
        let second = limiter.try_acquire("k");
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);
        assert_eq!(second.reset_after, Duration::from_millis(600));

        let third = limiter.try_acquire("k");
        assert!(!third.allowed);
        assert_eq!(third.retry_after, Some(Duration::from_millis(600)));
    }

    #[test]
    fn window_resets_after_elapsing() {
        let (limiter, clock) = limiter(1, 1000);
        assert!(limiter.try_acquire("k").allowed);
        assert!(!limiter.try_acquire("k").allowed);

        clock.advance(Duration::from_millis(1000));
        let decision = limiter.try_acquire("k");
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);
    }
}
