use std::collections::HashSet;

use crate::model::ContentItem;

/// Drops every item whose `source_url` was already seen, keeping the first.
///
/// The key is the raw URL string; no query or trailing-slash normalization.
#[must_use]
pub fn dedupe(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.source_url.clone()))
        .collect()
}
