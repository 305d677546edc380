//! Expiring maps used by [`CacheStorage`](super::CacheStorage).
//!
//! Expiry is checked lazily on read: an entry whose deadline has passed is
//! reported as absent but stays in the map until it is overwritten, deleted
//! or swept with [`Cache::purge_expired`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};

/// A cached value with its absolute expiry in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    /// The cached value.
    pub value: T,
    /// Deadline after which the entry is absent. `None` never expires.
    pub expires_at: Option<i64>,
}

impl<T> CacheEntry<T> {
    /// Whether the entry is past its deadline at `now`.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// String-keyed map whose entries expire a fixed TTL after being set.
pub struct Cache<T> {
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    entries: HashMap<String, CacheEntry<T>>,
}

impl<T: fmt::Debug> fmt::Debug for Cache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl<T> Cache<T> {
    /// Create a cache on the system clock. `None` disables expiry.
    #[must_use]
    pub fn new(ttl: Option<Duration>) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`.
    #[must_use]
    pub fn with_clock(ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: HashMap::new(),
        }
    }

    /// The TTL applied to every entry.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Get a live entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&T> {
        let now = self.clock.now_millis();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| &entry.value)
    }

    /// Store `value`, stamping it with `now + ttl`.
    pub fn set(&mut self, key: impl Into<String>, value: T) {
        let expires_at = self.ttl.map(|ttl| {
            let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            self.clock.now_millis().saturating_add(ttl_ms)
        });
        self.entries
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Remove an entry, live or expired.
    pub fn delete(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Whether the map holds no entries at all, expired ones included.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }
}

/// Two-level cache: namespace to a [`Cache`] of keys.
///
/// A namespace's inner cache is created on the first `set` into it and
/// dropped once a `delete` leaves it empty.
pub struct NamespaceCache<T> {
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    namespaces: HashMap<String, Cache<T>>,
}

impl<T: fmt::Debug> fmt::Debug for NamespaceCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceCache")
            .field("ttl", &self.ttl)
            .field("namespaces", &self.namespaces)
            .finish_non_exhaustive()
    }
}

impl<T> NamespaceCache<T> {
    /// Create an empty cache on the system clock.
    #[must_use]
    pub fn new(ttl: Option<Duration>) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create an empty cache reading time from `clock`.
    #[must_use]
    pub fn with_clock(ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            namespaces: HashMap::new(),
        }
    }

    /// Get a live entry.
    #[must_use]
    pub fn get(&self, namespace: &str, key: &str) -> Option<&T> {
        self.namespaces.get(namespace).and_then(|ns| ns.get(key))
    }

    /// Store `value` under `namespace`/`key`.
    pub fn set(&mut self, namespace: &str, key: impl Into<String>, value: T) {
        let ns = self
            .namespaces
            .entry(namespace.to_owned())
            .or_insert_with(|| Cache::with_clock(self.ttl, Arc::clone(&self.clock)));
        ns.set(key, value);
    }

    /// Remove an entry, dropping the namespace if it is left empty.
    pub fn delete(&mut self, namespace: &str, key: &str) {
        let Some(ns) = self.namespaces.get_mut(namespace) else {
            return;
        };
        ns.delete(key);
        if ns.is_empty() {
            self.namespaces.remove(namespace);
        }
    }

    /// Number of namespaces currently held.
    #[must_use]
    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    /// Whether no namespace holds entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Drop every expired entry and any namespace left empty.
    pub fn purge_expired(&mut self) -> usize {
        let mut removed = 0usize;
        self.namespaces.retain(|_, ns| {
            removed = removed.saturating_add(ns.purge_expired());
            !ns.is_empty()
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn clocked<T>(ttl_ms: Option<u64>) -> (Arc<ManualClock>, Cache<T>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = Cache::with_clock(ttl_ms.map(Duration::from_millis), clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_get_set_delete() {
        let (_, mut cache) = clocked(Some(100));
        assert!(cache.is_empty());
        cache.set("a", 1);
        assert_eq!(cache.get("a"), Some(&1));
        assert!(cache.get("b").is_none());
        cache.delete("a");
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expires_at_deadline() {
        let (clock, mut cache) = clocked(Some(100));
        cache.set("a", "v");
        clock.advance(99);
        assert_eq!(cache.get("a"), Some(&"v"));
        clock.advance(1);
        assert!(cache.get("a").is_none());
        // Still stored until purged.
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let (clock, mut cache) = clocked(None);
        cache.set("a", 1);
        clock.advance(i64::MAX);
        assert_eq!(cache.get("a"), Some(&1));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_set_refreshes_deadline() {
        let (clock, mut cache) = clocked(Some(100));
        cache.set("a", 1);
        clock.advance(80);
        cache.set("a", 2);
        clock.advance(80);
        assert_eq!(cache.get("a"), Some(&2));
    }

    #[test]
    fn test_namespace_cache_drops_empty_namespace() {
        let clock = Arc::new(ManualClock::new(0));
        let mut cache = NamespaceCache::with_clock(None, clock);
        cache.set("one", "a", 1);
        cache.set("one", "b", 2);
        cache.set("two", "a", 3);
        assert_eq!(cache.namespace_count(), 2);
        assert_eq!(cache.get("one", "b"), Some(&2));
        assert_eq!(cache.get("two", "a"), Some(&3));
        assert!(cache.get("three", "a").is_none());

        cache.delete("one", "a");
        assert_eq!(cache.namespace_count(), 2);
        cache.delete("one", "b");
        assert_eq!(cache.namespace_count(), 1);
        cache.delete("missing", "a");
        assert_eq!(cache.namespace_count(), 1);
    }

    #[test]
    fn test_namespace_cache_expiry() {
        let clock = Arc::new(ManualClock::new(0));
        let mut cache = NamespaceCache::with_clock(Some(Duration::from_millis(10)), clock.clone());
        cache.set("one", "a", 1);
        clock.advance(10);
        assert!(cache.get("one", "a").is_none());
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.namespace_count(), 0);
        assert!(cache.is_empty());
    }
}
