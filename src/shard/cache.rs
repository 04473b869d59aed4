//! Bounded shard-handle cache.
//!
//! Maps shard ids to shared coordinator instances so replica topology is not
//! re-materialized on every request. Eviction is strict LRU; `get` refreshes
//! recency. Callers receive `Arc` handles, so evicting or invalidating an
//! entry never affects an operation that already holds it.
//!
//! The cache is the only shared mutable structure of the write path. A single
//! mutex guards the LRU bookkeeping and is never held across an await point.

use crate::model::ShardId;
use crate::ops::metrics::WritePathMetrics;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default number of live shard instances.
pub const DEFAULT_SHARD_CACHE_CAPACITY: usize = 100;

/// LRU cache of shard handles.
pub struct ShardCache<S> {
    entries: Mutex<LruCache<ShardId, Arc<S>>>,
    metrics: Arc<WritePathMetrics>,
}

impl<S> ShardCache<S> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self::with_metrics(capacity, Arc::new(WritePathMetrics::new()))
    }

    /// Create a cache that reports hits, misses and evictions to `metrics`.
    pub fn with_metrics(capacity: usize, metrics: Arc<WritePathMetrics>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            metrics,
        }
    }

    /// Get a handle, marking it most recently used.
    pub fn get(&self, shard_id: &ShardId) -> Option<Arc<S>> {
        let handle = self.entries.lock().get(shard_id).cloned();
        if handle.is_some() {
            self.metrics.record_cache_hit();
        } else {
            self.metrics.record_cache_miss();
        }
        handle
    }

    /// Insert or replace a handle, evicting the least recently used entry
    /// when the cache is full.
    pub fn put(&self, shard_id: ShardId, handle: Arc<S>) {
        let displaced = self.entries.lock().push(shard_id, handle);
        if let Some((evicted, _)) = displaced {
            if evicted != shard_id {
                self.metrics.record_cache_eviction();
                tracing::debug!(shard_id = %evicted, "shard evicted from cache");
            }
        }
    }

    /// Drop a handle. Returns it if it was cached.
    pub fn invalidate(&self, shard_id: &ShardId) -> Option<Arc<S>> {
        self.entries.lock().pop(shard_id)
    }

    /// Check membership without touching recency.
    pub fn contains(&self, shard_id: &ShardId) -> bool {
        self.entries.lock().contains(shard_id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Cached shard ids, most recently used first.
    pub fn shard_ids(&self) -> Vec<ShardId> {
        self.entries.lock().iter().map(|(id, _)| *id).collect()
    }
}

impl<S> Default for ShardCache<S> {
    fn default() -> Self {
        Self::new(DEFAULT_SHARD_CACHE_CAPACITY)
    }
}

impl<S> std::fmt::Debug for ShardCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
