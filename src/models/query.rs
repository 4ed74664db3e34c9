//! Search query models.

use chrono::NaiveDate;
use url::Url;

/// Chronicling America collection search endpoint
pub const DEFAULT_SEARCH_BASE: &str = "https://www.loc.gov/collections/chronicling-america/";

/// Results requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Response sections requested from the search endpoint
pub const DEFAULT_FIELDS: &str = "results,pagination";

/// Query parameters owned by the harvester; caller values for these are replaced
const HARVESTER_PARAMS: [&str; 3] = ["fo", "c", "at"];

/// A search against the collection endpoint
///
/// Immutable once built: the `with_*` methods consume and return a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    url: Url,
    page_size: u32,
    fields: String,
}

impl SearchQuery {
    /// Create a query from a raw search URL
    pub fn from_url(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?))
    }

    /// Create a query from an already parsed URL
    pub fn new(url: Url) -> Self {
        Self {
            url,
            page_size: DEFAULT_PAGE_SIZE,
            fields: DEFAULT_FIELDS.to_string(),
        }
    }

    /// Set results per page
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the `at` field selector
    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = fields.into();
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn fields(&self) -> &str {
        &self.fields
    }

    /// Look up a query parameter of the search URL
    pub fn param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Short description for logs, e.g. `qs=coolie location_state=west virginia`
    pub fn label(&self) -> String {
        let parts: Vec<String> = ["qs", "location_state", "start_date", "end_date"]
            .iter()
            .filter_map(|key| self.param(key).map(|v| format!("{}={}", key, v)))
            .collect();
        if parts.is_empty() {
            self.url.to_string()
        } else {
            parts.join(" ")
        }
    }

    /// Build the request URL for one results page.
    ///
    /// `page` is either the query URL itself or a server supplied next link.
    /// Existing `fo`, `c` and `at` values are dropped and replaced with the
    /// harvester's own so every page is requested the same way.
    pub fn page_url(&self, page: &Url) -> Url {
        let kept: Vec<(String, String)> = page
            .query_pairs()
            .filter(|(k, _)| !HARVESTER_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut url = page.clone();
        url.set_query(None);
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &kept {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("fo", "json");
            pairs.append_pair("c", &self.page_size.to_string());
            pairs.append_pair("at", &self.fields);
        }
        url
    }
}

/// Builder for advanced collection searches
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    base: String,
    keyword: String,
    state: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    page_size: u32,
    fields: String,
}

impl QueryBuilder {
    /// Start a keyword search against the default endpoint
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            base: DEFAULT_SEARCH_BASE.to_string(),
            keyword: keyword.into(),
            state: None,
            start_date: None,
            end_date: None,
            page_size: DEFAULT_PAGE_SIZE,
            fields: DEFAULT_FIELDS.to_string(),
        }
    }

    /// Override the collection endpoint
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    /// Restrict to a state, e.g. "west virginia"
    pub fn state(mut self, state: impl Into<String>) -> Self {
        let state = state.into();
        self.state = if state.trim().is_empty() {
            None
        } else {
            Some(state.trim().to_lowercase())
        };
        self
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = fields.into();
        self
    }

    /// Build the search query
    pub fn build(&self) -> Result<SearchQuery, url::ParseError> {
        let mut url = Url::parse(&self.base)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("dl", "page");
            pairs.append_pair("ops", "AND");
            pairs.append_pair("qs", &self.keyword);
            pairs.append_pair("searchType", "advanced");
            if let Some(state) = &self.state {
                pairs.append_pair("location_state", state);
            }
            if let Some(start) = self.start_date {
                pairs.append_pair("start_date", &start.format("%Y-%m-%d").to_string());
            }
            if let Some(end) = self.end_date {
                pairs.append_pair("end_date", &end.format("%Y-%m-%d").to_string());
            }
        }

        Ok(SearchQuery::new(url)
            .with_page_size(self.page_size)
            .with_fields(self.fields.clone()))
    }

    /// Split the search into one query per calendar year, inclusive
    pub fn year_chunks(&self, start_year: i32, end_year: i32) -> Result<Vec<YearChunk>, url::ParseError> {
        let mut chunks = Vec::new();
        for year in start_year..=end_year {
            let (Some(start), Some(end)) = (
                NaiveDate::from_ymd_opt(year, 1, 1),
                NaiveDate::from_ymd_opt(year, 12, 31),
            ) else {
                continue;
            };
            let query = self.clone().start_date(start).end_date(end).build()?;
            chunks.push(YearChunk { year, query });
        }
        Ok(chunks)
    }
}

/// One calendar year of a chunked search
#[derive(Debug, Clone)]
pub struct YearChunk {
    pub year: i32,
    pub query: SearchQuery,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_parameters() {
        let query = QueryBuilder::new("coolie")
            .state("West Virginia")
            .start_date(NaiveDate::from_ymd_opt(1870, 1, 1).unwrap())
            .end_date(NaiveDate::from_ymd_opt(1874, 12, 31).unwrap())
            .build()
            .unwrap();

        assert_eq!(query.param("qs").as_deref(), Some("coolie"));
        assert_eq!(query.param("location_state").as_deref(), Some("west virginia"));
        assert_eq!(query.param("start_date").as_deref(), Some("1870-01-01"));
        assert_eq!(query.param("end_date").as_deref(), Some("1874-12-31"));
        assert_eq!(query.param("searchType").as_deref(), Some("advanced"));
        assert!(query.url().as_str().contains("location_state=west+virginia"));
        assert_eq!(query.page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_page_url_replaces_harvester_params() {
        let query = SearchQuery::from_url(
            "https://www.loc.gov/collections/chronicling-america/?qs=coolie&fo=json&c=100",
        )
        .unwrap()
        .with_page_size(25);

        let url = query.page_url(query.url());
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("qs".to_string(), "coolie".to_string()),
                ("fo".to_string(), "json".to_string()),
                ("c".to_string(), "25".to_string()),
                ("at".to_string(), "results,pagination".to_string()),
            ]
        );
    }

    #[test]
    fn test_year_chunks() {
        let chunks = QueryBuilder::new("coolie").year_chunks(1870, 1872).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].year, 1871);
        assert_eq!(chunks[1].query.param("start_date").as_deref(), Some("1871-01-01"));
        assert_eq!(chunks[1].query.param("end_date").as_deref(), Some("1871-12-31"));

        assert!(QueryBuilder::new("x").year_chunks(1875, 1870).unwrap().is_empty());
    }

    #[test]
    fn test_label() {
        let query = QueryBuilder::new("coolie").state("ohio").build().unwrap();
        assert_eq!(query.label(), "qs=coolie location_state=ohio");
    }
}
