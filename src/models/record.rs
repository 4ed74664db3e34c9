//! Search results, item references and item detail documents.

use serde::Deserialize;
use std::fmt;
use url::Url;

use super::flex;

/// One entry of a search results page
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResultRecord {
    /// Item or resource URL, untrimmed
    #[serde(default, deserialize_with = "flex::opt_raw_text")]
    pub id: Option<String>,

    /// Format label, e.g. "newspaper page" or "collection"
    #[serde(default, deserialize_with = "flex::text")]
    pub original_format: String,

    #[serde(default, deserialize_with = "flex::text")]
    pub title: String,
}

impl ResultRecord {
    pub fn new(id: impl Into<String>, original_format: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            original_format: original_format.into(),
            title: String::new(),
        }
    }
}

/// Pagination block of a search page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPagination {
    #[serde(default, deserialize_with = "flex::opt_count")]
    pub total: Option<u64>,

    #[serde(default, deserialize_with = "flex::opt_text")]
    pub next: Option<String>,
}

/// One page of search results
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub results: Vec<ResultRecord>,

    #[serde(default)]
    pub pagination: Option<SearchPagination>,
}

impl SearchPage {
    pub fn total(&self) -> Option<u64> {
        self.pagination.as_ref().and_then(|p| p.total)
    }

    /// Cursor for the page after this one, resolved against `current`
    pub fn next_cursor(&self, current: &Url) -> Result<PaginationCursor, url::ParseError> {
        match self.pagination.as_ref().and_then(|p| p.next.as_deref()) {
            Some(next) => Ok(PaginationCursor::Next(current.join(next)?)),
            None => Ok(PaginationCursor::End),
        }
    }
}

/// Position in a paginated result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationCursor {
    Next(Url),
    End,
}

/// Which kind of detail URL an item reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Item,
    Resource,
}

/// A harvested identifier accepted by the filter policy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemReference {
    url: String,
    kind: ItemKind,
}

impl ItemReference {
    /// Only the filter builds references, after checking the URL prefix
    pub(crate) fn new(url: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }
}

impl fmt::Display for ItemReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Item detail document (`<item url>?fo=json`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemDetail {
    #[serde(default)]
    pub item: Option<ItemSection>,

    #[serde(default)]
    pub resource: Option<ResourceLink>,

    #[serde(default)]
    pub resources: Vec<ResourceLink>,

    #[serde(default)]
    pub pagination: Option<DetailPagination>,
}

/// The `item` section of a detail document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemSection {
    #[serde(default, deserialize_with = "flex::text")]
    pub newspaper_title: String,
    #[serde(default, deserialize_with = "flex::text")]
    pub date: String,
    #[serde(default, deserialize_with = "flex::text")]
    pub location_state: String,
    #[serde(default, deserialize_with = "flex::text")]
    pub location_city: String,
    #[serde(default, deserialize_with = "flex::text")]
    pub number_lccn: String,
    #[serde(default, deserialize_with = "flex::text")]
    pub contributor_names: String,
    #[serde(default, deserialize_with = "flex::text")]
    pub batch: String,
}

/// A resource entry; only the PDF link is used
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceLink {
    #[serde(default, deserialize_with = "flex::text")]
    pub pdf: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailPagination {
    #[serde(default, deserialize_with = "flex::text")]
    pub current: String,
}
