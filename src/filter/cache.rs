//! Per-worker bounded match caches
//!
//! The compiled rule set is shared read-only across worker threads; all
//! mutable match state lives here. Each pattern-bearing text filter is
//! assigned a slot at compile time, and every worker owns one LRU cache per
//! slot, so cache mutation needs no synchronization on the per-record path.

use std::num::NonZeroUsize;

use lru::LruCache;

use super::FilterOutcome;

/// Default cache capacity per filter when none is configured
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// A cached evaluation: `None` is the remembered-reject sentinel
type CachedOutcome = Option<FilterOutcome>;

/// Pool of bounded per-filter match caches owned by one worker
///
/// Keys are the exact attribute source text; values are the accept snapshot
/// or the reject sentinel, so a hit never re-runs the pattern either way.
pub struct MatchCaches {
    caches: Vec<LruCache<String, CachedOutcome>>,
}

impl std::fmt::Debug for MatchCaches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchCaches")
            .field("slots", &self.caches.len())
            .finish()
    }
}

impl MatchCaches {
    /// Create a pool with `slots` caches of the given capacity each
    pub fn new(slots: usize, capacity: NonZeroUsize) -> Self {
        Self {
            caches: (0..slots).map(|_| LruCache::new(capacity)).collect(),
        }
    }

    /// Create an empty pool for a processor compiled without caching
    pub fn disabled() -> Self {
        Self { caches: Vec::new() }
    }

    /// Number of cache slots in the pool
    pub fn slots(&self) -> usize {
        self.caches.len()
    }

    pub(crate) fn lookup(&mut self, slot: usize, source: &str) -> Option<CachedOutcome> {
        self.caches.get_mut(slot)?.get(source).cloned()
    }

    pub(crate) fn store(&mut self, slot: usize, source: String, outcome: CachedOutcome) {
        if let Some(cache) = self.caches.get_mut(slot) {
            cache.put(source, outcome);
        }
    }
}
