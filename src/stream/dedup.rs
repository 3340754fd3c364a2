//! Bounded seen-set for fragments and members
//!
//! Presence is best effort: once more than `capacity` distinct keys have been
//! touched the least recently used ones are forgotten, and a very long-lived
//! stream may legitimately reprocess them.

use crate::{Result, TideError};
use lru::LruCache;
use std::num::NonZeroUsize;

/// Least-recently-used set of processed identifiers
#[derive(Debug)]
pub struct DedupCache {
    entries: LruCache<String, ()>,
}

impl DedupCache {
    /// Creates an empty cache holding at most `capacity` keys
    ///
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Returns true if `key` is present; does not refresh its recency
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Inserts `key` (or refreshes it) as the most recently used entry
    pub fn set(&mut self, key: &str) {
        self.entries.put(key.to_string(), ());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Exports the keys ordered least recently used first, most recent last
    pub fn dump(&self) -> Vec<String> {
        self.entries.iter().rev().map(|(key, _)| key.clone()).collect()
    }

    /// Rebuilds a cache from a [`dump`](Self::dump)
    ///
    /// Keys are replayed in order so recency (and therefore future eviction
    /// order) matches the exported cache.
    pub fn load(capacity: usize, keys: &[String]) -> Self {
        let mut cache = Self::new(capacity);
        for key in keys {
            cache.set(key);
        }
        cache
    }

    /// Serializes the dump as a JSON array
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.dump())?)
    }

    /// Restores a cache from a JSON array produced by [`to_json`](Self::to_json)
    pub fn from_json(capacity: usize, json: &str) -> Result<Self> {
        let keys: Vec<String> = serde_json::from_str(json)
            .map_err(|e| TideError::InvalidCheckpoint(format!("processed URIs: {}", e)))?;
        Ok(Self::load(capacity, &keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_all_keys_within_capacity() {
        let mut cache = DedupCache::new(3);
        cache.set("a");
        cache.set("b");
        cache.set("c");

        assert!(cache.has("a"));
        assert!(cache.has("b"));
        assert!(cache.has("c"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_overflow_evicts_least_recently_touched() {
        let mut cache = DedupCache::new(3);
        cache.set("a");
        cache.set("b");
        cache.set("c");
        // Touch "a" again so "b" becomes the oldest
        cache.set("a");
        cache.set("d");

        assert!(!cache.has("b"));
        assert!(cache.has("a"));
        assert!(cache.has("c"));
        assert!(cache.has("d"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_has_does_not_refresh_recency() {
        let mut cache = DedupCache::new(2);
        cache.set("a");
        cache.set("b");
        assert!(cache.has("a"));
        cache.set("c");

        assert!(!cache.has("a"));
        assert!(cache.has("b"));
    }

    #[test]
    fn test_dump_orders_most_recent_last() {
        let mut cache = DedupCache::new(5);
        cache.set("a");
        cache.set("b");
        cache.set("c");
        cache.set("a");

        assert_eq!(cache.dump(), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_load_preserves_eviction_order() {
        let mut original = DedupCache::new(3);
        original.set("x");
        original.set("y");
        original.set("z");
        original.set("x");

        let mut restored = DedupCache::from_json(3, &original.to_json().unwrap()).unwrap();
        assert_eq!(restored.dump(), original.dump());

        original.set("w");
        restored.set("w");
        assert_eq!(restored.dump(), original.dump());
        assert!(!restored.has("y"));
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut cache = DedupCache::new(0);
        cache.set("a");
        assert_eq!(cache.capacity(), 1);
        assert!(cache.has("a"));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            DedupCache::from_json(3, "{\"not\": \"a list\"}"),
            Err(TideError::InvalidCheckpoint(_))
        ));
    }
}
