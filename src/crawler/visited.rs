//! Visited-URL tracking for a single crawl

use std::collections::HashSet;

/// Normalized URLs already claimed by the current traversal
///
/// A URL is marked before any navigation to it is attempted and is never
/// removed, so a cyclic link graph cannot send the crawler back to a page it
/// has already started on. The set is deliberately not `Clone`: one instance
/// is threaded through the whole traversal.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Marks `url` as visited
    ///
    /// Returns `true` if the URL was not already present.
    pub fn mark(&mut self, url: impl Into<String>) -> bool {
        self.urls.insert(url.into())
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }
}
