//! Configuration file support.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api]
//! search_base = "https://www.loc.gov/collections/chronicling-america/"
//! item_host = "http://www.loc.gov"
//! timeout_secs = 20
//!
//! [rate_limits]
//! min_delay_secs = 7.0
//! jitter = true
//! requests_per_minute = 20
//! max_backoff_exponent = 4
//!
//! [harvest]
//! page_size = 10
//! page_delay_secs = 3.0
//! max_retries = 5
//! throttle_delay_secs = 60.0
//!
//! [metadata]
//! max_retries = 3
//! strict_city = false
//! batch_size = 25
//! checkpoint_every = 10
//!
//! [output]
//! directory = "output"
//! file_stem = "coolie_WV_1870_1874"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use std::path::Path;

use super::Config;

/// File name looked up by [`super::find_config_file`]
pub const CONFIG_FILE_NAME: &str = "chronicling-harvester.toml";

/// Write a configuration as pretty TOML, creating parent directories
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigFileError> {
    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
    }

    std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
