//! Request pacing for the loc.gov API.
//!
//! The service tolerates roughly 20 requests a minute from one client and
//! answers bursts with HTTP 429. [`RateLimiter`] spaces requests by a
//! minimum delay that doubles with each consecutive throttle response, and
//! can additionally enforce a hard per-minute quota.

use governor::{DefaultDirectRateLimiter, Quota};
use rand::Rng;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::config::{secs, RateLimitConfig};

/// Mutable part of the limiter, guarded so the limiter can be shared
#[derive(Debug, Default)]
struct LimiterState {
    /// When the previous `wait` returned
    last_request: Option<Instant>,
    consecutive_errors: u32,
    requests: u64,
}

/// Minimum-spacing request gate with throttle backoff
pub struct RateLimiter {
    min_delay: Duration,
    jitter: bool,
    max_backoff_exponent: u32,
    quota: Option<DefaultDirectRateLimiter>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Create a limiter spacing requests by `min_delay`, without jitter or quota
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            jitter: false,
            max_backoff_exponent: 4,
            quota: None,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// A limiter that never sleeps
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(secs(config.min_delay_secs))
            .with_jitter(config.jitter)
            .with_max_backoff_exponent(config.max_backoff_exponent)
            .with_requests_per_minute(config.requests_per_minute)
    }

    /// Scale each delay by a random factor in [0.85, 1.15]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_backoff_exponent(mut self, exponent: u32) -> Self {
        self.max_backoff_exponent = exponent;
        self
    }

    /// Cap requests per minute; 0 removes the cap
    pub fn with_requests_per_minute(mut self, requests: u32) -> Self {
        self.quota = NonZeroU32::new(requests)
            .map(|n| DefaultDirectRateLimiter::direct(Quota::per_minute(n)));
        self
    }

    /// Delay before the next request given `errors` consecutive throttles
    pub fn backoff_delay(&self, errors: u32) -> Duration {
        let exponent = errors.min(self.max_backoff_exponent).min(16);
        self.min_delay
            .checked_mul(2u32.pow(exponent))
            .unwrap_or(Duration::MAX)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let factor: f64 = rand::rng().random_range(0.85..=1.15);
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(delay)
    }

    /// Wait until the next request may be sent.
    ///
    /// Returns once the per-minute quota has room and at least the current
    /// delay has passed since the previous `wait` returned. Concurrent
    /// callers are served one at a time.
    pub async fn wait(&self) {
        if let Some(quota) = &self.quota {
            quota.until_ready().await;
        }

        let mut state = self.state.lock().await;
        let delay = self.jittered(self.backoff_delay(state.consecutive_errors));

        if let Some(last) = state.last_request {
            let elapsed = last.elapsed();
            if elapsed < delay {
                let remaining = delay - elapsed;
                tracing::trace!("Rate limiter sleeping {:?}", remaining);
                sleep(remaining).await;
            }
        }

        state.last_request = Some(Instant::now());
        state.requests += 1;
    }

    /// Record an HTTP 429; later waits grow until successes bring the count down
    pub async fn record_throttle(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_errors = state.consecutive_errors.saturating_add(1);
        tracing::debug!(
            "Throttled, consecutive errors now {} (next delay {:?})",
            state.consecutive_errors,
            self.backoff_delay(state.consecutive_errors)
        );
    }

    /// Record a successful request; decays the error count by one
    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_errors = state.consecutive_errors.saturating_sub(1);
    }

    pub async fn consecutive_errors(&self) -> u32 {
        self.state.lock().await.consecutive_errors
    }

    /// Number of requests let through so far
    pub async fn request_count(&self) -> u64 {
        self.state.lock().await.requests
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_delay", &self.min_delay)
            .field("jitter", &self.jitter)
            .field("max_backoff_exponent", &self.max_backoff_exponent)
            .field("quota", &self.quota.is_some())
            .finish()
    }
}
