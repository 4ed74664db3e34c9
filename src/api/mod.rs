//! Access to the loc.gov JSON API.
//!
//! The harvester and the metadata fetcher talk to the catalog through the
//! [`CatalogApi`] trait. [`LocApi`] is the HTTP implementation; [`MockApi`]
//! answers from scripted responses and backs the tests.
//!
//! Every failure is classified into an [`ApiError`] so the retry loop can
//! tell throttling and network trouble (retried) apart from bad statuses
//! and malformed bodies (not retried).

mod loc;
pub mod mock;

pub use loc::LocApi;
pub use mock::MockApi;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::models::{SearchPage, SearchQuery};

/// A JSON catalog reachable by URL
#[async_trait]
pub trait CatalogApi: Send + Sync + std::fmt::Debug {
    /// Human-readable name used in logs
    fn name(&self) -> &str;

    /// GET `url` and decode the body as JSON.
    ///
    /// Implementations map HTTP 429 to [`ApiError::Throttled`], any other
    /// non-success status to [`ApiError::Status`], and a non-JSON content
    /// type or body to [`ApiError::Malformed`].
    async fn get_json(&self, url: &Url) -> Result<Value, ApiError>;
}

/// Errors that can occur when talking to the catalog
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// HTTP 429, with the server's Retry-After in seconds when it sent one
    #[error("Throttled by server (HTTP 429)")]
    Throttled { retry_after: Option<u64> },

    /// Network failure or timeout
    #[error("Transient request error: {0}")]
    Transient(String),

    /// Any other non-success status
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// Non-JSON content type, undecodable body or unexpected shape
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Malformed(err.to_string())
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::Transient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Malformed(format!("JSON: {}", err))
    }
}

/// Outcome of a connectivity probe
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    /// URL that was requested
    pub url: Url,
    /// Result count reported by the server
    pub total: Option<u64>,
}

/// Issue one single-result search to check the API is reachable and not throttling us
pub async fn probe(api: &dyn CatalogApi, query: &SearchQuery) -> Result<ProbeReport, ApiError> {
    let probe_query = query.clone().with_page_size(1);
    let url = probe_query.page_url(probe_query.url());

    let value = api.get_json(&url).await?;
    let page: SearchPage = serde_json::from_value(value)?;

    Ok(ProbeReport {
        url,
        total: page.total(),
    })
}
