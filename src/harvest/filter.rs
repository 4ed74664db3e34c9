//! Which search results become item references.

use crate::models::{ItemKind, ItemReference, ResultRecord};

/// Format labels of records that are never newspaper pages
const REJECTED_FORMATS: [&str; 2] = ["collection", "web page"];

/// Extra caller-supplied check applied after the built-in rules
pub type RecordPredicate = Box<dyn Fn(&ResultRecord) -> bool + Send + Sync>;

/// Accepts item and resource identifiers on one host.
///
/// A record is rejected when its format label contains `collection` or
/// `web page` (case-sensitive), when it has no identifier, or when the
/// identifier starts with neither `<host>/item` nor `<host>/resource`.
/// Accepted identifiers are kept exactly as received.
pub struct ItemFilter {
    item_prefix: String,
    resource_prefix: String,
    predicate: Option<RecordPredicate>,
}

impl ItemFilter {
    /// Filter for identifiers on `host`, e.g. `http://www.loc.gov`
    pub fn for_host(host: &str) -> Self {
        let host = host.trim_end_matches('/');
        Self {
            item_prefix: format!("{}/item", host),
            resource_prefix: format!("{}/resource", host),
            predicate: None,
        }
    }

    /// Reject records for which `predicate` returns false
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ResultRecord) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Apply the filter policy to one record
    pub fn accept(&self, record: &ResultRecord) -> Option<ItemReference> {
        if REJECTED_FORMATS
            .iter()
            .any(|format| record.original_format.contains(format))
        {
            return None;
        }

        let reference = self.reference(record.id.as_deref()?)?;

        match &self.predicate {
            Some(predicate) if !predicate(record) => None,
            _ => Some(reference),
        }
    }

    /// Classify a bare identifier by its prefix
    pub fn reference(&self, id: &str) -> Option<ItemReference> {
        if id.starts_with(&self.item_prefix) {
            Some(ItemReference::new(id, ItemKind::Item))
        } else if id.starts_with(&self.resource_prefix) {
            Some(ItemReference::new(id, ItemKind::Resource))
        } else {
            None
        }
    }
}

impl std::fmt::Debug for ItemFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemFilter")
            .field("item_prefix", &self.item_prefix)
            .field("resource_prefix", &self.resource_prefix)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}
