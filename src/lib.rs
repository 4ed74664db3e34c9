//! # Chronicling Harvester
//!
//! Harvests newspaper page metadata from the Library of Congress
//! Chronicling America collection and writes it to CSV.
//!
//! ## Architecture
//!
//! A run has two sequential stages sharing one rate limiter:
//!
//! - [`harvest`]: page through a search and collect item references
//! - [`metadata`]: fetch each item's detail document and extract a row
//!
//! Supporting modules:
//!
//! - [`api`]: the [`CatalogApi`](api::CatalogApi) seam, its HTTP and mock implementations
//! - [`models`]: queries, search pages, item documents and rows
//! - [`export`]: date normalization and CSV output
//! - [`summary`]: end-of-run statistics
//! - [`utils`]: HTTP client, rate limiting, retry and validation
//! - [`config`]: Configuration management

pub mod api;
pub mod config;
pub mod export;
pub mod harvest;
pub mod metadata;
pub mod models;
pub mod summary;
pub mod utils;

// Re-export commonly used types
pub use api::{CatalogApi, LocApi};
pub use harvest::{Harvester, ItemFilter};
pub use metadata::MetadataFetcher;
pub use models::{ItemReference, MetadataRow, SearchQuery};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
