use std::collections::HashSet;
use url::Url;

/// Article URLs already scheduled from one listing page
///
/// Scoped to a single listing lineage, so separate listing pages never
/// contend for it. Iteration order is insertion order.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: HashSet<String>,
    order: Vec<Url>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `url`; returns false if it was already scheduled
    pub fn insert(&mut self, url: Url) -> bool {
        if !self.seen.insert(url.as_str().to_string()) {
            return false;
        }
        self.order.push(url);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn into_urls(self) -> Vec<Url> {
        self.order
    }
}
