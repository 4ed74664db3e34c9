//! Configuration management.
//!
//! Values are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or the first file found by [`find_config_file`])
//! 3. environment variables prefixed `CHRONAM_`, with `__` between section
//!    and key, e.g. `CHRONAM_RATE_LIMITS__MIN_DELAY_SECS=7`
//! 4. command line flags (applied by the binary)

mod file_config;

pub use file_config::{save_config, ConfigFileError, CONFIG_FILE_NAME};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{DEFAULT_FIELDS, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_BASE};
use crate::utils::RetryConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Request pacing
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    /// Search harvesting
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Item metadata fetching
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// CSV output
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Collection search endpoint
    #[serde(default = "default_search_base")]
    pub search_base: String,

    /// Scheme and host that item identifiers start with
    #[serde(default = "default_item_host")]
    pub item_host: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Optional proxy for all requests (http, https or socks5 URL)
    #[serde(default)]
    pub proxy: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            search_base: default_search_base(),
            item_host: default_item_host(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            proxy: None,
        }
    }
}

fn default_search_base() -> String {
    DEFAULT_SEARCH_BASE.to_string()
}

fn default_item_host() -> String {
    "http://www.loc.gov".to_string()
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"), " (historical research)").to_string()
}

fn default_timeout() -> u64 {
    20
}

fn default_connect_timeout() -> u64 {
    10
}

/// Request pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum spacing between requests
    #[serde(default = "default_min_delay")]
    pub min_delay_secs: f64,

    /// Scale each delay by a random factor in [0.85, 1.15]
    #[serde(default = "default_true")]
    pub jitter: bool,

    /// Hard ceiling per rolling minute, 0 disables
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,

    /// Cap on the consecutive-error exponent (delay * 2^n)
    #[serde(default = "default_backoff_exponent")]
    pub max_backoff_exponent: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: default_min_delay(),
            jitter: true,
            requests_per_minute: default_rpm(),
            max_backoff_exponent: default_backoff_exponent(),
        }
    }
}

fn default_min_delay() -> f64 {
    4.0
}

fn default_rpm() -> u32 {
    20
}

fn default_backoff_exponent() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

/// Search harvesting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_fields")]
    pub fields: String,

    /// Pause between result pages, on top of the rate limiter
    #[serde(default = "default_page_delay")]
    pub page_delay_secs: f64,

    #[serde(default = "default_harvest_retries")]
    pub max_retries: u32,

    /// First sleep after a 429; doubles per attempt
    #[serde(default = "default_throttle_delay")]
    pub throttle_delay_secs: f64,

    /// Sleep after a network error or timeout
    #[serde(default = "default_transient_delay")]
    pub transient_delay_secs: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,

    /// Stop a query once this many identifiers were accepted
    #[serde(default)]
    pub max_items_per_query: Option<usize>,

    /// Pause between year chunks
    #[serde(default = "default_chunk_pause")]
    pub chunk_pause_secs: f64,

    /// Longer pause taken after every `long_pause_every` chunks
    #[serde(default = "default_long_chunk_pause")]
    pub long_chunk_pause_secs: f64,

    #[serde(default = "default_long_pause_every")]
    pub long_pause_every: u32,

    /// Drop repeated identifiers across queries, keeping first occurrence
    #[serde(default)]
    pub dedup: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            fields: default_fields(),
            page_delay_secs: default_page_delay(),
            max_retries: default_harvest_retries(),
            throttle_delay_secs: default_throttle_delay(),
            transient_delay_secs: default_transient_delay(),
            max_delay_secs: default_max_delay(),
            max_items_per_query: None,
            chunk_pause_secs: default_chunk_pause(),
            long_chunk_pause_secs: default_long_chunk_pause(),
            long_pause_every: default_long_pause_every(),
            dedup: false,
        }
    }
}

impl HarvestConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retries.saturating_add(1),
            throttle_delay: secs(self.throttle_delay_secs),
            transient_delay: secs(self.transient_delay_secs),
            max_delay: secs(self.max_delay_secs),
            backoff_multiplier: 2.0,
        }
    }

    pub fn page_delay(&self) -> Duration {
        secs(self.page_delay_secs)
    }
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_fields() -> String {
    DEFAULT_FIELDS.to_string()
}

fn default_page_delay() -> f64 {
    3.0
}

fn default_harvest_retries() -> u32 {
    5
}

fn default_throttle_delay() -> f64 {
    60.0
}

fn default_transient_delay() -> f64 {
    60.0
}

fn default_max_delay() -> f64 {
    960.0
}

fn default_chunk_pause() -> f64 {
    5.0
}

fn default_long_chunk_pause() -> f64 {
    15.0
}

fn default_long_pause_every() -> u32 {
    3
}

/// Item metadata fetching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_metadata_retries")]
    pub max_retries: u32,

    #[serde(default = "default_metadata_throttle_delay")]
    pub throttle_delay_secs: f64,

    #[serde(default = "default_transient_delay")]
    pub transient_delay_secs: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,

    /// Also skip items whose city is empty
    #[serde(default)]
    pub strict_city: bool,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_batch_pause")]
    pub batch_pause_secs: f64,

    /// Write a JSON checkpoint every N rows, 0 disables
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            max_retries: default_metadata_retries(),
            throttle_delay_secs: default_metadata_throttle_delay(),
            transient_delay_secs: default_transient_delay(),
            max_delay_secs: default_max_delay(),
            strict_city: false,
            batch_size: default_batch_size(),
            batch_pause_secs: default_batch_pause(),
            checkpoint_every: default_checkpoint_every(),
        }
    }
}

impl MetadataConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retries.saturating_add(1),
            throttle_delay: secs(self.throttle_delay_secs),
            transient_delay: secs(self.transient_delay_secs),
            max_delay: secs(self.max_delay_secs),
            backoff_multiplier: 2.0,
        }
    }
}

fn default_metadata_retries() -> u32 {
    3
}

fn default_metadata_throttle_delay() -> f64 {
    120.0
}

fn default_batch_size() -> usize {
    25
}

fn default_batch_pause() -> f64 {
    10.0
}

fn default_checkpoint_every() -> usize {
    10
}

/// CSV output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Created when missing
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,

    #[serde(default = "default_file_stem")]
    pub file_stem: String,

    /// Append `_YYYYmmdd_HHMM` to the file name
    #[serde(default = "default_true")]
    pub timestamp: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            file_stem: default_file_stem(),
            timestamp: true,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_file_stem() -> String {
    "chronicling_america".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "json" for structured output, anything else for plain text
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Seconds as a duration; negative and NaN values become zero, huge ones saturate
pub(crate) fn secs(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

/// Load configuration, layering an optional file and the environment over defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder =
        config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix("CHRONAM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

/// Find a configuration file in the working directory or the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(env!("CARGO_PKG_NAME")).join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}
