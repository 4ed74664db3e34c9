//! Search harvesting: page through a search and collect item references.
//!
//! [`Harvester::harvest`] walks the server's `pagination.next` links with an
//! explicit cursor, sending every request through the shared
//! [`RateLimiter`]. Throttling, network trouble, bad statuses and malformed
//! pages end the walk early and the references gathered so far are
//! returned with a [`StopReason`]. Only a query that points at a detail
//! page is an error.

mod filter;

pub use filter::{ItemFilter, RecordPredicate};

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use crate::api::{ApiError, CatalogApi};
use crate::config::{secs, HarvestConfig};
use crate::models::{ItemReference, PaginationCursor, SearchPage, SearchQuery, YearChunk};
use crate::utils::{
    validate_search_url, with_retry, RateLimiter, RetryConfig, RetryResult, TransientError,
    ValidationError,
};

/// Fatal harvest errors
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] ValidationError),
}

/// Why a harvest stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The last page had no next link
    Exhausted,
    /// The per-query item cap was reached
    MaxItems,
    /// HTTP 429 persisted through every retry
    ThrottleExhausted,
    /// Network errors persisted through every retry
    TransientExhausted,
    /// The server answered with a non-success status
    Rejected(u16),
    /// The page was not JSON or did not have the expected shape
    Malformed(String),
}

impl StopReason {
    /// True when every available page was read (or the cap was hit)
    pub fn is_complete(&self) -> bool {
        matches!(self, StopReason::Exhausted | StopReason::MaxItems)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Exhausted => write!(f, "no more pages"),
            StopReason::MaxItems => write!(f, "item cap reached"),
            StopReason::ThrottleExhausted => write!(f, "still throttled after retries"),
            StopReason::TransientExhausted => write!(f, "network errors after retries"),
            StopReason::Rejected(status) => write!(f, "HTTP {}", status),
            StopReason::Malformed(detail) => write!(f, "malformed page: {}", detail),
        }
    }
}

/// References collected by one harvest
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    /// Accepted references, in the order received
    pub items: Vec<ItemReference>,
    /// Pages successfully read
    pub pages: usize,
    /// Result count the server reported on the first page
    pub total_reported: Option<u64>,
    pub stop: StopReason,
}

/// Outcome of one year of a chunked harvest
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub year: i32,
    pub outcome: HarvestOutcome,
}

/// Pacing and limits for the harvester
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub retry: RetryConfig,
    /// Pause before following a next link
    pub page_delay: Duration,
    pub max_items: Option<usize>,
    pub chunk_pause: Duration,
    pub long_chunk_pause: Duration,
    /// Take the long pause after every this many chunks, 0 never
    pub long_pause_every: u32,
}

impl HarvestSettings {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            retry: config.retry_config(),
            page_delay: config.page_delay(),
            max_items: config.max_items_per_query,
            chunk_pause: secs(config.chunk_pause_secs),
            long_chunk_pause: secs(config.long_chunk_pause_secs),
            long_pause_every: config.long_pause_every,
        }
    }

    /// No pauses, `max_attempts` attempts per page
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            retry: RetryConfig::immediate(max_attempts),
            page_delay: Duration::ZERO,
            max_items: None,
            chunk_pause: Duration::ZERO,
            long_chunk_pause: Duration::ZERO,
            long_pause_every: 0,
        }
    }

    pub fn with_max_items(mut self, max_items: Option<usize>) -> Self {
        self.max_items = max_items;
        self
    }

    /// Pause taken after chunk number `completed` (1-based)
    pub fn chunk_pause_after(&self, completed: usize) -> Duration {
        let every = self.long_pause_every as usize;
        if every > 0 && completed % every == 0 {
            self.long_chunk_pause
        } else {
            self.chunk_pause
        }
    }
}

/// Pages through searches and collects accepted item references
#[derive(Debug)]
pub struct Harvester {
    api: Arc<dyn CatalogApi>,
    limiter: Arc<RateLimiter>,
    filter: ItemFilter,
    settings: HarvestSettings,
}

impl Harvester {
    pub fn new(
        api: Arc<dyn CatalogApi>,
        limiter: Arc<RateLimiter>,
        filter: ItemFilter,
        settings: HarvestSettings,
    ) -> Self {
        Self {
            api,
            limiter,
            filter,
            settings,
        }
    }

    /// Harvest every page of `query`.
    ///
    /// Fails only when the query URL is an item or resource page. Any other
    /// problem ends the walk and the partial result is returned.
    pub async fn harvest(&self, query: &SearchQuery) -> Result<HarvestOutcome, HarvestError> {
        validate_search_url(query.url())?;

        tracing::info!("Harvesting {} from {}", query.label(), self.api.name());

        let mut items = Vec::new();
        let mut pages = 0;
        let mut total_reported = None;
        let mut cursor = PaginationCursor::Next(query.url().clone());

        let stop = 'pages: loop {
            let PaginationCursor::Next(page) = cursor else {
                break StopReason::Exhausted;
            };
            if self.at_cap(items.len()) {
                tracing::info!("Reached {} items, stopping", items.len());
                break StopReason::MaxItems;
            }

            let request_url = query.page_url(&page);
            let value = {
                let api = &self.api;
                let request_url = &request_url;
                match with_retry(self.settings.retry, &self.limiter, move || {
                    api.get_json(request_url)
                })
                .await
                {
                    RetryResult::Success(value) => value,
                    RetryResult::TransientFailure(err, kind, attempts) => {
                        tracing::warn!(
                            "Stopping after page {}: {} ({} attempts)",
                            pages,
                            err,
                            attempts
                        );
                        break match kind {
                            TransientError::Throttled(_) => StopReason::ThrottleExhausted,
                            TransientError::Network => StopReason::TransientExhausted,
                        };
                    }
                    RetryResult::PermanentFailure(err) => {
                        tracing::warn!("Stopping after page {}: {}", pages, err);
                        break match err {
                            ApiError::Status(status) => StopReason::Rejected(status),
                            other => StopReason::Malformed(other.to_string()),
                        };
                    }
                }
            };

            let search_page: SearchPage = match serde_json::from_value(value) {
                Ok(search_page) => search_page,
                Err(e) => {
                    tracing::warn!("Stopping after page {}: unexpected page shape: {}", pages, e);
                    break StopReason::Malformed(e.to_string());
                }
            };

            pages += 1;
            if total_reported.is_none() {
                total_reported = search_page.total();
            }

            let before = items.len();
            for record in &search_page.results {
                if let Some(reference) = self.filter.accept(record) {
                    items.push(reference);
                    if self.at_cap(items.len()) {
                        tracing::info!("Reached {} items, stopping", items.len());
                        break 'pages StopReason::MaxItems;
                    }
                }
            }
            tracing::debug!(
                "Page {}: {} results, {} accepted, {} total",
                pages,
                search_page.results.len(),
                items.len() - before,
                items.len()
            );

            cursor = match search_page.next_cursor(&page) {
                Ok(next) => next,
                Err(e) => {
                    tracing::warn!("Unusable next link after page {}: {}", pages, e);
                    break StopReason::Malformed(e.to_string());
                }
            };

            if matches!(cursor, PaginationCursor::Next(_)) && !self.settings.page_delay.is_zero() {
                sleep(self.settings.page_delay).await;
            }
        };

        let outcome = HarvestOutcome {
            items,
            pages,
            total_reported,
            stop,
        };

        if outcome.stop.is_complete() {
            tracing::info!(
                "Harvested {} items from {} pages ({})",
                outcome.items.len(),
                outcome.pages,
                outcome.stop
            );
        } else {
            tracing::warn!(
                "Partial harvest: {} items from {} pages ({})",
                outcome.items.len(),
                outcome.pages,
                outcome.stop
            );
        }

        Ok(outcome)
    }

    fn at_cap(&self, collected: usize) -> bool {
        self.settings.max_items.is_some_and(|max| collected >= max)
    }

    /// Harvest each year chunk in turn, pausing between chunks
    pub async fn harvest_chunks(&self, chunks: &[YearChunk]) -> Result<Vec<ChunkOutcome>, HarvestError> {
        let mut outcomes = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            tracing::info!("Year {} ({}/{})", chunk.year, index + 1, chunks.len());
            let outcome = self.harvest(&chunk.query).await?;
            outcomes.push(ChunkOutcome {
                year: chunk.year,
                outcome,
            });

            if index + 1 < chunks.len() {
                let pause = self.settings.chunk_pause_after(index + 1);
                if !pause.is_zero() {
                    tracing::debug!("Pausing {:?} before the next year", pause);
                    sleep(pause).await;
                }
            }
        }

        Ok(outcomes)
    }
}

/// All references of a chunked harvest, chunk by chunk
pub fn chunk_items(outcomes: &[ChunkOutcome]) -> Vec<ItemReference> {
    outcomes
        .iter()
        .flat_map(|chunk| chunk.outcome.items.iter().cloned())
        .collect()
}

/// Drop repeated references, keeping the first occurrence of each
pub fn dedup_preserving_order(items: Vec<ItemReference>) -> Vec<ItemReference> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.as_str().to_string()))
        .collect()
}
