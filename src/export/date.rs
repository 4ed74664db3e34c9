//! Issue date normalization.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::models::MetadataRow;

/// Output format for issue dates
pub const DATE_FORMAT: &str = "%m-%d-%Y";

/// Full dates accepted on input
const DATE_INPUTS: [&str; 5] = ["%Y-%m-%d", "%Y%m%d", "%m/%d/%Y", "%B %d, %Y", "%m-%d-%Y"];

fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Some(date) = DATE_INPUTS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
    {
        return Some(date);
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.date_naive());
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(datetime.date());
    }

    // partial dates fall back to the first day of the period
    match raw.len() {
        7 => NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d").ok(),
        4 if raw.chars().all(|c| c.is_ascii_digit()) => {
            NaiveDate::parse_from_str(&format!("{}-01-01", raw), "%Y-%m-%d").ok()
        }
        _ => None,
    }
}

/// Reformat a date as `MM-DD-YYYY`; unparseable input is returned unchanged
pub fn normalize_date(raw: &str) -> String {
    match parse_date(raw.trim()) {
        Some(date) => date.format(DATE_FORMAT).to_string(),
        None => raw.to_string(),
    }
}

/// Normalize the issue date of every row; rows are never dropped
pub fn normalize_rows(rows: &mut [MetadataRow]) {
    for row in rows.iter_mut() {
        let normalized = normalize_date(&row.issue_date);
        if normalized != row.issue_date {
            tracing::trace!("Issue date {} -> {}", row.issue_date, normalized);
            row.issue_date = normalized;
        }
    }
}
