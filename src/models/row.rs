//! The exported metadata row.

use serde::{Deserialize, Serialize};

/// One newspaper page as written to the CSV file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    #[serde(rename = "Newspaper Title")]
    pub newspaper_title: String,

    #[serde(rename = "Issue Date")]
    pub issue_date: String,

    #[serde(rename = "Page Number")]
    pub page_number: String,

    #[serde(rename = "LCCN")]
    pub lccn: String,

    #[serde(rename = "City")]
    pub city: String,

    #[serde(rename = "State")]
    pub state: String,

    #[serde(rename = "Contributor")]
    pub contributor: String,

    #[serde(rename = "Batch")]
    pub batch: String,

    #[serde(rename = "PDF Link")]
    pub pdf_link: String,
}

impl MetadataRow {
    /// CSV header, in column order
    pub const COLUMNS: [&'static str; 9] = [
        "Newspaper Title",
        "Issue Date",
        "Page Number",
        "LCCN",
        "City",
        "State",
        "Contributor",
        "Batch",
        "PDF Link",
    ];

    /// Year prefix of the raw issue date, if it has one
    pub fn year(&self) -> Option<&str> {
        let year = self.issue_date.get(..4)?;
        year.chars().all(|c| c.is_ascii_digit()).then_some(year)
    }
}
