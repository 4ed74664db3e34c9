//! HTTP implementation of [`CatalogApi`] for loc.gov.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use super::{ApiError, CatalogApi};
use crate::config::ApiConfig;
use crate::utils::HttpClient;

/// The loc.gov JSON API over HTTP
#[derive(Debug, Clone)]
pub struct LocApi {
    http: HttpClient,
}

impl LocApi {
    /// Create an API client on top of an existing HTTP client
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Create an API client from configuration
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = HttpClient::from_config(config)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::new(http))
    }
}

#[async_trait]
impl CatalogApi for LocApi {
    fn name(&self) -> &str {
        "loc.gov"
    }

    async fn get_json(&self, url: &Url) -> Result<Value, ApiError> {
        let response = self
            .http
            .client()
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(ApiError::Throttled { retry_after });
        }

        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("json") {
            return Err(ApiError::Malformed(format!(
                "expected JSON, got content type '{}'",
                content_type
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
