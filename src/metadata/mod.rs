//! Per-item metadata fetching.
//!
//! [`MetadataFetcher::fetch_metadata`] requests the JSON detail document of
//! every harvested reference, one at a time and in batches, and extracts a
//! [`MetadataRow`] from each. A failing item is recorded in the report and
//! skipped; the run always continues with the next item.

mod checkpoint;
mod extract;

pub use checkpoint::Checkpoint;
pub use extract::{ensure_json_format, extract_row, first_pdf_link};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use url::Url;

use crate::api::{ApiError, CatalogApi};
use crate::config::{secs, MetadataConfig};
use crate::models::{ItemDetail, ItemReference, MetadataRow};
use crate::utils::{with_retry, ProgressReporter, RateLimiter, RetryConfig, RetryResult, TransientError};

/// Why an item produced no row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("still throttled after {0} attempts")]
    Throttled(u32),

    #[error("network errors after {0} attempts")]
    Transient(u32),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid item URL: {0}")]
    InvalidUrl(String),

    #[error("no item section")]
    MissingItem,

    #[error("no city")]
    MissingCity,
}

impl FailureReason {
    /// Short grouping key for summaries
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::Throttled(_) => "throttled",
            FailureReason::Transient(_) => "network",
            FailureReason::Status(_) => "status",
            FailureReason::Malformed(_) => "malformed",
            FailureReason::InvalidUrl(_) => "invalid url",
            FailureReason::MissingItem => "no item section",
            FailureReason::MissingCity => "no city",
        }
    }
}

/// An item that was skipped
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    pub reference: ItemReference,
    pub reason: FailureReason,
}

/// Rows and skipped items of one fetch run
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// One row per successfully fetched item, in reference order
    pub rows: Vec<MetadataRow>,
    pub failures: Vec<FetchFailure>,
}

impl FetchReport {
    /// Number of failures per [`FailureReason::kind`]
    pub fn failure_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for failure in &self.failures {
            *counts.entry(failure.reason.kind()).or_insert(0) += 1;
        }
        counts
    }
}

/// Retry policy, batching and checkpointing for the fetcher
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub retry: RetryConfig,
    pub strict_city: bool,
    pub batch_size: usize,
    pub batch_pause: Duration,
    /// Save a checkpoint every this many rows, 0 never
    pub checkpoint_every: usize,
}

impl FetchSettings {
    pub fn from_config(config: &MetadataConfig) -> Self {
        Self {
            retry: config.retry_config(),
            strict_city: config.strict_city,
            batch_size: config.batch_size,
            batch_pause: secs(config.batch_pause_secs),
            checkpoint_every: config.checkpoint_every,
        }
    }

    /// No pauses, no checkpoints, `max_attempts` attempts per item
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            retry: RetryConfig::immediate(max_attempts),
            strict_city: false,
            batch_size: 0,
            batch_pause: Duration::ZERO,
            checkpoint_every: 0,
        }
    }
}

/// Fetches item detail documents and extracts rows
#[derive(Debug)]
pub struct MetadataFetcher {
    api: Arc<dyn CatalogApi>,
    limiter: Arc<RateLimiter>,
    settings: FetchSettings,
    checkpoint: Option<Checkpoint>,
    quiet: bool,
}

impl MetadataFetcher {
    pub fn new(api: Arc<dyn CatalogApi>, limiter: Arc<RateLimiter>, settings: FetchSettings) -> Self {
        Self {
            api,
            limiter,
            settings,
            checkpoint: None,
            quiet: false,
        }
    }

    /// Save collected rows to `checkpoint` every `checkpoint_every` rows
    pub fn with_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Suppress progress log lines
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Fetch every reference, in order, skipping the ones that fail
    pub async fn fetch_metadata(&self, references: Vec<ItemReference>) -> FetchReport {
        let total = references.len();
        let progress = if self.quiet {
            ProgressReporter::quiet("Fetching metadata", total)
        } else {
            ProgressReporter::new("Fetching metadata", total)
        };

        let batch_size = if self.settings.batch_size == 0 {
            total.max(1)
        } else {
            self.settings.batch_size
        };
        let batches = total.div_ceil(batch_size);

        let mut report = FetchReport::default();

        for (index, batch) in references.chunks(batch_size).enumerate() {
            if index > 0 && !self.settings.batch_pause.is_zero() {
                tracing::debug!("Pausing {:?} before batch {}/{}", self.settings.batch_pause, index + 1, batches);
                sleep(self.settings.batch_pause).await;
            }

            for reference in batch {
                match self.fetch_one(reference).await {
                    Ok(row) => {
                        report.rows.push(row);
                        self.maybe_checkpoint(&report.rows);
                    }
                    Err(reason) => {
                        tracing::warn!("Skipping {}: {}", reference, reason);
                        report.failures.push(FetchFailure {
                            reference: reference.clone(),
                            reason,
                        });
                    }
                }
                progress.inc();
            }
        }

        progress.finish();
        if let Some(checkpoint) = &self.checkpoint {
            self.save_checkpoint(checkpoint, &report.rows);
        }

        tracing::info!(
            "Fetched {} rows, skipped {} of {} items",
            report.rows.len(),
            report.failures.len(),
            total
        );
        report
    }

    /// Fetch and extract a single item
    pub async fn fetch_one(&self, reference: &ItemReference) -> Result<MetadataRow, FailureReason> {
        let request_url = Url::parse(&ensure_json_format(reference.as_str()))
            .map_err(|e| FailureReason::InvalidUrl(e.to_string()))?;

        let api = &self.api;
        let request_url = &request_url;
        let value = match with_retry(self.settings.retry, &self.limiter, move || api.get_json(request_url)).await {
            RetryResult::Success(value) => value,
            RetryResult::TransientFailure(_, TransientError::Throttled(_), attempts) => {
                return Err(FailureReason::Throttled(attempts))
            }
            RetryResult::TransientFailure(_, TransientError::Network, attempts) => {
                return Err(FailureReason::Transient(attempts))
            }
            RetryResult::PermanentFailure(ApiError::Status(status)) => return Err(FailureReason::Status(status)),
            RetryResult::PermanentFailure(err) => return Err(FailureReason::Malformed(err.to_string())),
        };

        let detail: ItemDetail =
            serde_json::from_value(value).map_err(|e| FailureReason::Malformed(e.to_string()))?;

        let row = extract_row(&detail, self.settings.strict_city)?;
        tracing::debug!("{}: {} {}", reference, row.newspaper_title, row.issue_date);
        Ok(row)
    }

    fn maybe_checkpoint(&self, rows: &[MetadataRow]) {
        let every = self.settings.checkpoint_every;
        if let Some(checkpoint) = &self.checkpoint {
            if every > 0 && rows.len() % every == 0 {
                self.save_checkpoint(checkpoint, rows);
            }
        }
    }

    fn save_checkpoint(&self, checkpoint: &Checkpoint, rows: &[MetadataRow]) {
        match checkpoint.save(rows) {
            Ok(()) => tracing::debug!("Checkpoint: {} rows to {}", rows.len(), checkpoint.path().display()),
            Err(e) => tracing::warn!("Failed to write checkpoint {}: {}", checkpoint.path().display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{item_detail, MockApi};
    use crate::harvest::ItemFilter;
    use serde_json::json;
    use tempfile::tempdir;

    fn references(ids: &[&str]) -> Vec<ItemReference> {
        let filter = ItemFilter::for_host("http://www.loc.gov");
        ids.iter().filter_map(|id| filter.reference(id)).collect()
    }

    fn fetcher(api: Arc<MockApi>, settings: FetchSettings) -> MetadataFetcher {
        MetadataFetcher::new(api, Arc::new(RateLimiter::unlimited()), settings).quiet(true)
    }

    #[tokio::test]
    async fn test_fetch_skips_failed_items_and_continues() {
        let api = Arc::new(MockApi::new());
        api.respond("http://www.loc.gov/item/a/", item_detail("A", "1872-01-04", "wheeling"));
        api.fail("http://www.loc.gov/item/b/", ApiError::Status(500));
        api.respond("http://www.loc.gov/item/c/", json!({"pagination": {"current": 1}}));
        api.respond("http://www.loc.gov/resource/d/", item_detail("D", "1873-02-01", "charleston"));

        let refs = references(&[
            "http://www.loc.gov/item/a/",
            "http://www.loc.gov/item/b/",
            "http://www.loc.gov/item/c/",
            "http://www.loc.gov/resource/d/?sp=4",
        ]);
        let report = fetcher(api.clone(), FetchSettings::immediate(2)).fetch_metadata(refs).await;

        let titles: Vec<&str> = report.rows.iter().map(|r| r.newspaper_title.as_str()).collect();
        assert_eq!(titles, vec!["A", "D"]);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].reason, FailureReason::Status(500));
        assert_eq!(report.failures[1].reason, FailureReason::MissingItem);

        let counts = report.failure_counts();
        assert_eq!(counts.get("status"), Some(&1));
        assert_eq!(counts.get("no item section"), Some(&1));

        let last = api.requests().pop().unwrap();
        assert_eq!(last.as_str(), "http://www.loc.gov/resource/d/?sp=4&fo=json");
    }

    #[tokio::test]
    async fn test_throttled_item_retried_then_skipped() {
        let api = Arc::new(MockApi::new());
        api.fail("http://www.loc.gov/item/a/", ApiError::Throttled { retry_after: None });
        api.respond("http://www.loc.gov/item/a/", item_detail("A", "1872-01-04", "wheeling"));
        api.fail("http://www.loc.gov/item/b/", ApiError::Throttled { retry_after: None });

        let report = fetcher(api.clone(), FetchSettings::immediate(3))
            .fetch_metadata(references(&["http://www.loc.gov/item/a/", "http://www.loc.gov/item/b/"]))
            .await;

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.failures[0].reason, FailureReason::Throttled(3));
        assert_eq!(api.hits("/item/a/"), 2);
        assert_eq!(api.hits("/item/b/"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_skipped_and_next_batch_runs() {
        let api = Arc::new(MockApi::new());
        api.fail(
            "http://www.loc.gov/item/a/",
            ApiError::Transient("connection reset".to_string()),
        );
        api.respond("http://www.loc.gov/item/b/", item_detail("B", "1872-01-04", "wheeling"));

        let settings = FetchSettings {
            batch_size: 1,
            batch_pause: Duration::from_secs(5),
            ..FetchSettings::immediate(3)
        };
        let started = tokio::time::Instant::now();
        let report = fetcher(api.clone(), settings)
            .fetch_metadata(references(&["http://www.loc.gov/item/a/", "http://www.loc.gov/item/b/"]))
            .await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].reason, FailureReason::Transient(3));
        assert_eq!(report.failure_counts().get("network"), Some(&1));
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].newspaper_title, "B");
        assert_eq!(api.hits("/item/a/"), 3);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_strict_city_skips_cityless_items() {
        let api = Arc::new(MockApi::new());
        api.respond("http://www.loc.gov/item/a/", item_detail("A", "1872-01-04", ""));

        let settings = FetchSettings {
            strict_city: true,
            ..FetchSettings::immediate(1)
        };
        let report = fetcher(api, settings)
            .fetch_metadata(references(&["http://www.loc.gov/item/a/"]))
            .await;

        assert!(report.rows.is_empty());
        assert_eq!(report.failures[0].reason, FailureReason::MissingCity);
    }

    #[tokio::test]
    async fn test_batches_and_checkpoint() {
        let dir = tempdir().unwrap();
        let api = Arc::new(MockApi::new());
        for id in ["a", "b", "c"] {
            api.respond(
                &format!("http://www.loc.gov/item/{}/", id),
                item_detail(id, "1872-01-04", "wheeling"),
            );
        }

        let settings = FetchSettings {
            batch_size: 2,
            checkpoint_every: 2,
            ..FetchSettings::immediate(1)
        };
        let checkpoint = Checkpoint::new(dir.path().join("checkpoint.json"));
        let report = fetcher(api, settings)
            .with_checkpoint(checkpoint.clone())
            .fetch_metadata(references(&[
                "http://www.loc.gov/item/a/",
                "http://www.loc.gov/item/b/",
                "http://www.loc.gov/item/c/",
            ]))
            .await;

        assert_eq!(report.rows.len(), 3);
        assert_eq!(checkpoint.load().unwrap(), report.rows);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let api = Arc::new(MockApi::new());
        let report = fetcher(api.clone(), FetchSettings::immediate(1)).fetch_metadata(Vec::new()).await;
        assert!(report.rows.is_empty());
        assert!(api.requests().is_empty());
    }
}
