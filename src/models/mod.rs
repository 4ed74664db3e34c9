//! Core data models for search queries, harvested items and exported rows.

pub mod flex;
mod query;
mod record;
mod row;

pub use query::{
    QueryBuilder, SearchQuery, YearChunk, DEFAULT_FIELDS, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_BASE,
};
pub use record::{
    DetailPagination, ItemDetail, ItemKind, ItemReference, ItemSection, PaginationCursor,
    ResourceLink, ResultRecord, SearchPage, SearchPagination,
};
pub use row::MetadataRow;
