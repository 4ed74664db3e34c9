//! Retry utilities with exponential backoff for throttled API calls.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use super::RateLimiter;
use crate::api::ApiError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Sleep after the first HTTP 429; grows by `backoff_multiplier` per attempt
    pub throttle_delay: Duration,
    /// Sleep after a network error or timeout
    pub transient_delay: Duration,
    /// Maximum sleep between attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            throttle_delay: Duration::from_secs(60),
            transient_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(960),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Retry without sleeping between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            throttle_delay: Duration::ZERO,
            transient_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientError {
    /// HTTP 429 (with optional retry-after seconds)
    Throttled(Option<u64>),
    /// Network failure or timeout
    Network,
}

impl TransientError {
    /// Classify an API error; `None` means retrying cannot help
    pub fn from_api_error(err: &ApiError) -> Option<Self> {
        match err {
            ApiError::Throttled { retry_after } => Some(TransientError::Throttled(*retry_after)),
            ApiError::Transient(_) => Some(TransientError::Network),
            ApiError::Status(_) | ApiError::Malformed(_) | ApiError::InvalidRequest(_) => None,
        }
    }

    /// Sleep before attempt `attempt + 1`, after `attempt` failed
    pub fn recommended_delay(&self, config: &RetryConfig, attempt: u32) -> Duration {
        match self {
            TransientError::Throttled(retry_after) => {
                let exp = config.throttle_delay.as_secs_f64()
                    * config
                        .backoff_multiplier
                        .powi(attempt.saturating_sub(1) as i32);
                let backoff = Duration::try_from_secs_f64(exp)
                    .unwrap_or(config.max_delay)
                    .min(config.max_delay);
                match retry_after {
                    Some(seconds) => backoff.max(Duration::from_secs(*seconds)),
                    None => backoff,
                }
            }
            TransientError::Network => config.transient_delay.min(config.max_delay),
        }
    }
}

/// Result of a retry operation
#[derive(Debug)]
pub enum RetryResult<T> {
    /// Operation succeeded
    Success(T),
    /// Operation failed with a transient error after all retries
    TransientFailure(ApiError, TransientError, u32),
    /// Operation failed with a permanent error
    PermanentFailure(ApiError),
}

/// Execute a request with rate limiting and retry.
///
/// `limiter.wait()` runs before every attempt. A throttle response is
/// recorded on the limiter (which lengthens its spacing) and followed by a
/// backoff sleep; a success decays the limiter's error count. Permanent
/// errors return at once.
pub async fn with_retry<T, F, Fut>(
    config: RetryConfig,
    limiter: &RateLimiter,
    mut operation: F,
) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempts = 0;

    loop {
        attempts += 1;
        limiter.wait().await;

        let error = match operation().await {
            Ok(result) => {
                limiter.record_success().await;
                if attempts > 1 {
                    tracing::info!(
                        "Request succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return RetryResult::Success(result);
            }
            Err(error) => error,
        };

        let Some(transient) = TransientError::from_api_error(&error) else {
            return RetryResult::PermanentFailure(error);
        };

        if matches!(transient, TransientError::Throttled(_)) {
            limiter.record_throttle().await;
        }

        if attempts >= config.max_attempts {
            tracing::warn!("Request failed after {} attempts: {}", attempts, error);
            return RetryResult::TransientFailure(error, transient, attempts);
        }

        let delay = transient.recommended_delay(&config, attempts);
        tracing::warn!(
            "{} (attempt {}/{}), retrying in {:?}",
            error,
            attempts,
            config.max_attempts,
            delay
        );
        sleep(delay).await;
    }
}
