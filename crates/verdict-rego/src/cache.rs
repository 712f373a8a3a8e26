//! Compiled-policy cache.
//!
//! Maps a policy fingerprint (`repo,group,name,version`) to the policy
//! snapshot that was last compiled. A hit skips the storage fetch and the
//! static-data JSON parse; the engine itself is rebuilt per request because
//! the header extension function is bound to request state.
//!
//! Invalidation is coarse: any policy change purges the whole cache. A purge
//! racing an in-flight compile is harmless - the stale snapshot is either
//! re-inserted and overwritten by the next change event, or misses and is
//! re-read.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use verdict_core::Policy;
use verdict_storage::PolicyChangeObserver;

/// Thread-safe cache of policy snapshots keyed by fingerprint.
///
/// Concurrent `get` calls never block `set` calls for unrelated keys
/// (sharded locking via `DashMap`); `purge` atomically empties the map.
#[derive(Default)]
pub struct PolicyCache {
    entries: DashMap<String, Arc<Policy>>,
    stats: CacheStatistics,
}

/// Cache statistics for monitoring.
#[derive(Debug, Default)]
pub struct CacheStatistics {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    purges: AtomicU64,
}

/// A point-in-time snapshot of cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub purges: u64,
    pub size: usize,
}

impl PolicyCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache wrapped in an `Arc` for sharing.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the cached snapshot for a fingerprint key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<Policy>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts or replaces the snapshot for a fingerprint key.
    pub fn set(&self, key: impl Into<String>, policy: Arc<Policy>) {
        self.entries.insert(key.into(), policy);
        self.stats.insertions.fetch_add(1, Ordering::Relaxed);
    }

    /// Empties the cache.
    pub fn purge(&self) {
        self.entries.clear();
        self.stats.purges.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of cached snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no snapshots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a snapshot of the cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            insertions: self.stats.insertions.load(Ordering::Relaxed),
            purges: self.stats.purges.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }
}

impl std::fmt::Debug for PolicyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyCache")
            .field("size", &self.entries.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[async_trait::async_trait]
impl PolicyChangeObserver for PolicyCache {
    /// Purges the cache on any policy change.
    ///
    /// The coordinates are informational; a future implementation may purge
    /// selectively by fingerprint.
    async fn policy_data_change(
        &self,
        _repository: &str,
        _group: &str,
        _name: &str,
        _version: &str,
    ) {
        self.purge();
    }
}
