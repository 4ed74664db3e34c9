//! End-of-run statistics.

use std::collections::{BTreeMap, HashMap};

use crate::metadata::FetchReport;
use crate::models::MetadataRow;

/// Counts logged when a run finishes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Item references handed to the fetcher
    pub identifiers: usize,
    pub rows: usize,
    pub failures: BTreeMap<&'static str, usize>,
    /// Most frequent newspaper titles, most common first
    pub top_newspapers: Vec<(String, usize)>,
    /// Rows per year of issue
    pub years: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn new(identifiers: usize, report: &FetchReport, top: usize) -> Self {
        Self {
            identifiers,
            rows: report.rows.len(),
            failures: report.failure_counts(),
            top_newspapers: top_newspapers(&report.rows, top),
            years: rows_per_year(&report.rows),
        }
    }

    /// Emit the summary through `tracing`
    pub fn log(&self) {
        tracing::info!("Identifiers harvested: {}", self.identifiers);
        tracing::info!("Rows fetched: {}", self.rows);

        for (reason, count) in &self.failures {
            tracing::info!("Skipped ({}): {}", reason, count);
        }
        for (year, count) in &self.years {
            tracing::info!("Year {}: {} pages", year, count);
        }
        for (title, count) in &self.top_newspapers {
            tracing::info!("{}: {} pages", title, count);
        }
    }
}

/// The `n` most frequent non-empty titles; ties are ordered by title
pub fn top_newspapers(rows: &[MetadataRow], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows.iter().filter(|r| !r.newspaper_title.is_empty()) {
        *counts.entry(row.newspaper_title.as_str()).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(title, count)| (title.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

fn rows_per_year(rows: &[MetadataRow]) -> BTreeMap<String, usize> {
    let mut years = BTreeMap::new();
    for year in rows.iter().filter_map(MetadataRow::year) {
        *years.entry(year.to_string()).or_insert(0) += 1;
    }
    years
}
