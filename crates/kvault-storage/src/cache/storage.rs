//! Read-through TTL cache in front of another [`Storage`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::{debug, trace};

use super::expiring::{Cache, NamespaceCache};
use crate::clock::{Clock, SystemClock};
use crate::error::{StorageError, StorageResult};
use crate::slug;
use crate::storage::{Document, Entry, EntryStream, KeyStream, Storage, ValueStream};

/// Hit and miss counters for a [`CacheStorage`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from the cache.
    pub hits: u64,
    /// Reads that went to the wrapped store.
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of reads served from cache (0.0 to 1.0).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits.saturating_add(self.misses);
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> StorageResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| StorageError::Internal(format!("cache lock poisoned: {e}")))
}

/// Caches listings and documents of a wrapped store for a fixed TTL.
///
/// Writes made through this adapter keep the cache coherent:
///
/// - `set` writes through, drops the namespace's cached listings and caches
///   the new document.
/// - `update` writes through, drops cached values and entries (keys cannot
///   change) and caches the merged document.
/// - `delete` drops the cached listings and document *before* deleting in
///   the wrapped store, and again once the wrapped store has answered.
///
/// Each namespace carries a write generation that these writes advance.
/// A read that misses records the generation before going to the wrapped
/// store and only fills the cache if it is unchanged when the read
/// completes, so a read that overlaps a write never caches what it saw.
///
/// Writes that bypass the adapter become visible only once the affected
/// cache entries expire. With no TTL they never do.
pub struct CacheStorage {
    inner: Arc<dyn Storage>,
    ttl: Option<Duration>,
    keys: Mutex<Cache<Vec<String>>>,
    values: Mutex<Cache<Vec<Document>>>,
    entries: Mutex<Cache<Vec<Entry>>>,
    items: Mutex<NamespaceCache<Document>>,
    generations: Mutex<HashMap<String, u64>>,
    counters: Counters,
}

impl std::fmt::Debug for CacheStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStorage")
            .field("ttl", &self.ttl)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl CacheStorage {
    /// Wrap `inner`, expiring cached data `ttl` after it is stored.
    ///
    /// `None` caches until the next write through this adapter.
    #[must_use]
    pub fn new(inner: Arc<dyn Storage>, ttl: Option<Duration>) -> Self {
        Self::with_clock(inner, ttl, Arc::new(SystemClock))
    }

    /// Wrap `inner` with expiry measured on `clock`.
    #[must_use]
    pub fn with_clock(
        inner: Arc<dyn Storage>,
        ttl: Option<Duration>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner,
            ttl,
            keys: Mutex::new(Cache::with_clock(ttl, Arc::clone(&clock))),
            values: Mutex::new(Cache::with_clock(ttl, Arc::clone(&clock))),
            entries: Mutex::new(Cache::with_clock(ttl, Arc::clone(&clock))),
            items: Mutex::new(NamespaceCache::with_clock(ttl, clock)),
            generations: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// The configured TTL.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Snapshot of the hit and miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop every expired entry from every cache.
    ///
    /// Expired entries are already ignored on read; this only reclaims
    /// memory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if a cache lock is poisoned.
    pub fn purge_expired(&self) -> StorageResult<usize> {
        let removed = lock(&self.keys)?
            .purge_expired()
            .saturating_add(lock(&self.values)?.purge_expired())
            .saturating_add(lock(&self.entries)?.purge_expired())
            .saturating_add(lock(&self.items)?.purge_expired());
        debug!(removed, "Purged expired cache entries");
        Ok(removed)
    }

    fn cached_listing<T: Clone>(
        &self,
        cache: &Mutex<Cache<Vec<T>>>,
        namespace: &str,
    ) -> StorageResult<Option<Vec<T>>> {
        let cached = lock(cache)?.get(namespace).cloned();
        if cached.is_some() {
            self.counters.hit();
            trace!(namespace, "Listing cache hit");
        } else {
            self.counters.miss();
            trace!(namespace, "Listing cache miss");
        }
        Ok(cached)
    }

    fn store_listing<T>(
        cache: &Mutex<Cache<Vec<T>>>,
        namespace: &str,
        listing: Vec<T>,
    ) -> StorageResult<()> {
        lock(cache)?.set(namespace, listing);
        Ok(())
    }

    fn cached_item(&self, namespace: &str, key: &str) -> StorageResult<Option<Document>> {
        let cached = lock(&self.items)?.get(namespace, key).cloned();
        if cached.is_some() {
            self.counters.hit();
            trace!(namespace, key, "Item cache hit");
        } else {
            self.counters.miss();
            trace!(namespace, key, "Item cache miss");
        }
        Ok(cached)
    }

    fn store_item(&self, namespace: &str, key: &str, value: Document) -> StorageResult<()> {
        lock(&self.items)?.set(namespace, key, value);
        Ok(())
    }

    fn evict_item(&self, namespace: &str, key: &str) -> StorageResult<()> {
        lock(&self.items)?.delete(namespace, key);
        Ok(())
    }

    fn generation(&self, namespace: &str) -> StorageResult<u64> {
        Ok(lock(&self.generations)?
            .get(namespace)
            .copied()
            .unwrap_or_default())
    }

    /// Run `fill` unless a write to `namespace` landed after `seen`.
    ///
    /// The generation lock is held while `fill` runs, so a concurrent
    /// write either completes first and is detected, or waits.
    fn fill_if_current(
        &self,
        namespace: &str,
        seen: u64,
        fill: impl FnOnce() -> StorageResult<()>,
    ) -> StorageResult<()> {
        let generations = lock(&self.generations)?;
        let current = generations.get(namespace).copied().unwrap_or_default();
        if current == seen {
            fill()
        } else {
            debug!(namespace, seen, current, "Read overlapped a write; not caching");
            Ok(())
        }
    }

    /// Advance the write generation of `namespace`, then run `apply` under
    /// the same lock.
    fn advance(
        &self,
        namespace: &str,
        apply: impl FnOnce() -> StorageResult<()>,
    ) -> StorageResult<()> {
        let mut generations = lock(&self.generations)?;
        let generation = generations.entry(namespace.to_owned()).or_default();
        *generation = generation.wrapping_add(1);
        apply()
    }

    fn forget_item(&self, namespace: &str, key: &str) -> StorageResult<()> {
        self.invalidate_listings(namespace, true)?;
        self.evict_item(namespace, key)
    }

    fn invalidate_listings(&self, namespace: &str, include_keys: bool) -> StorageResult<()> {
        if include_keys {
            lock(&self.keys)?.delete(namespace);
        }
        lock(&self.values)?.delete(namespace);
        lock(&self.entries)?.delete(namespace);
        debug!(namespace, include_keys, "Invalidated cached listings");
        Ok(())
    }
}

#[async_trait]
impl Storage for CacheStorage {
    fn entries<'a>(&'a self, namespace: &'a str) -> EntryStream<'a> {
        let stream = try_stream! {
            slug::validate_namespace(namespace)?;
            let cached = self.cached_listing(&self.entries, namespace)?;
            if let Some(cached) = cached {
                for entry in cached {
                    yield entry;
                }
            } else {
                let seen = self.generation(namespace)?;
                let mut buffer = Vec::new();
                let mut upstream = self.inner.entries(namespace);
                while let Some(entry) = upstream.try_next().await? {
                    buffer.push(entry.clone());
                    yield entry;
                }
                self.fill_if_current(namespace, seen, || {
                    Self::store_listing(&self.entries, namespace, buffer)
                })?;
            }
        };
        Box::pin(stream)
    }

    fn keys<'a>(&'a self, namespace: &'a str) -> KeyStream<'a> {
        let stream = try_stream! {
            slug::validate_namespace(namespace)?;
            let cached = self.cached_listing(&self.keys, namespace)?;
            if let Some(cached) = cached {
                for key in cached {
                    yield key;
                }
            } else {
                let seen = self.generation(namespace)?;
                let mut buffer = Vec::new();
                let mut upstream = self.inner.keys(namespace);
                while let Some(key) = upstream.try_next().await? {
                    buffer.push(key.clone());
                    yield key;
                }
                self.fill_if_current(namespace, seen, || {
                    Self::store_listing(&self.keys, namespace, buffer)
                })?;
            }
        };
        Box::pin(stream)
    }

    fn values<'a>(&'a self, namespace: &'a str) -> ValueStream<'a> {
        let stream = try_stream! {
            slug::validate_namespace(namespace)?;
            let cached = self.cached_listing(&self.values, namespace)?;
            if let Some(cached) = cached {
                for value in cached {
                    yield value;
                }
            } else {
                let seen = self.generation(namespace)?;
                let mut buffer = Vec::new();
                let mut upstream = self.inner.values(namespace);
                while let Some(value) = upstream.try_next().await? {
                    buffer.push(value.clone());
                    yield value;
                }
                self.fill_if_current(namespace, seen, || {
                    Self::store_listing(&self.values, namespace, buffer)
                })?;
            }
        };
        Box::pin(stream)
    }

    async fn has(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        slug::validate(namespace, key)?;
        if self.cached_item(namespace, key)?.is_some() {
            return Ok(true);
        }
        self.inner.has(namespace, key).await
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Document>> {
        slug::validate(namespace, key)?;
        if let Some(cached) = self.cached_item(namespace, key)? {
            return Ok(Some(cached));
        }
        let seen = self.generation(namespace)?;
        let fetched = self.inner.get(namespace, key).await?;
        if let Some(value) = &fetched {
            self.fill_if_current(namespace, seen, || {
                self.store_item(namespace, key, value.clone())
            })?;
        }
        Ok(fetched)
    }

    async fn set(&self, namespace: &str, key: &str, value: Document) -> StorageResult<()> {
        slug::validate(namespace, key)?;
        self.inner.set(namespace, key, value.clone()).await?;
        self.advance(namespace, || {
            self.invalidate_listings(namespace, true)?;
            self.store_item(namespace, key, value)
        })
    }

    async fn update(
        &self,
        namespace: &str,
        key: &str,
        patch: Document,
    ) -> StorageResult<Document> {
        slug::validate(namespace, key)?;
        let merged = self.inner.update(namespace, key, patch).await?;
        self.advance(namespace, || {
            self.invalidate_listings(namespace, false)?;
            self.store_item(namespace, key, merged.clone())
        })?;
        Ok(merged)
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        slug::validate(namespace, key)?;
        self.advance(namespace, || self.forget_item(namespace, key))?;
        let result = self.inner.delete(namespace, key).await;
        // Reads that started between the eviction and the backend delete
        // may have seen the document.
        self.advance(namespace, || self.forget_item(namespace, key))?;
        result
    }
}
