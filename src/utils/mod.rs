//! Utility modules supporting the harvest pipeline.
//!
//! - [`HttpClient`]: shared reqwest client built from configuration
//! - [`RateLimiter`]: minimum-spacing gate with throttle backoff and an optional per-minute quota
//! - [`with_retry`]: run one request through the limiter, retrying throttling and network errors
//! - [`ProgressReporter`]: periodic progress log lines for long fetch loops
//! - [`validate_search_url`]: reject item/resource URLs passed where a search URL is expected
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use chronicling_harvester::api::{CatalogApi, LocApi};
//! use chronicling_harvester::config::ApiConfig;
//! use chronicling_harvester::utils::{with_retry, RateLimiter, RetryConfig, RetryResult};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let api = LocApi::from_config(&ApiConfig::default())?;
//! let limiter = RateLimiter::new(Duration::from_secs(4)).with_jitter(true);
//! let url = url::Url::parse("https://www.loc.gov/collections/chronicling-america/?qs=coolie&fo=json")?;
//!
//! match with_retry(RetryConfig::default(), &limiter, || api.get_json(&url)).await {
//!     RetryResult::Success(body) => println!("{}", body),
//!     RetryResult::TransientFailure(err, _, attempts) => eprintln!("gave up after {}: {}", attempts, err),
//!     RetryResult::PermanentFailure(err) => eprintln!("{}", err),
//! }
//! # Ok(())
//! # }
//! ```

mod http;
mod progress;
mod rate_limit;
mod retry;
mod validate;

pub use http::HttpClient;
pub use progress::ProgressReporter;
pub use rate_limit::RateLimiter;
pub use retry::{with_retry, RetryConfig, RetryResult, TransientError};
pub use validate::{sanitize_filename, validate_search_url, ValidationError};
