//! CSV export of metadata rows.

mod date;

pub use date::{normalize_date, normalize_rows, DATE_FORMAT};

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::MetadataRow;
use crate::utils::{sanitize_filename, ValidationError};

/// Errors writing the output file
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid output file name: {0}")]
    FileName(#[from] ValidationError),
}

/// Output file name: the sanitized stem, an optional `_YYYYmmdd_HHMM` suffix, `.csv`
pub fn output_file_name(stem: &str, timestamp: Option<DateTime<Local>>) -> Result<String, ExportError> {
    let stem = sanitize_filename(stem)?;
    Ok(match timestamp {
        Some(at) => format!("{}_{}.csv", stem, at.format("%Y%m%d_%H%M")),
        None => format!("{}.csv", stem),
    })
}

/// Write `rows` under `directory`, creating it when missing.
///
/// The header is always written, so an empty run still produces a valid
/// file. Returns the path written.
pub fn write_csv(rows: &[MetadataRow], directory: &Path, file_name: &str) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(directory).map_err(|source| ExportError::CreateDir {
        path: directory.to_path_buf(),
        source,
    })?;

    let path = directory.join(file_name);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)?;

    writer.write_record(MetadataRow::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    tracing::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(path)
}

/// Normalize issue dates and write the CSV
pub fn export(mut rows: Vec<MetadataRow>, directory: &Path, file_name: &str) -> Result<PathBuf, ExportError> {
    normalize_rows(&mut rows);
    write_csv(&rows, directory, file_name)
}
