//! Cache Statistics Module
//!
//! Tracks lookup outcomes and sweep evictions. Counters are atomics so that
//! concurrent requests record them without a shared lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Live counters shared by the cache service.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    query_misses: AtomicU64,
    query_not_applicable: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Record Hit ==
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Miss ==
    /// A lookup for a key with no entry.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Expired ==
    /// A lookup that found an entry past its TTL. Also counted as a miss.
    pub fn record_expired(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query_miss(&self) {
        self.query_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query_not_applicable(&self) {
        self.query_not_applicable.fetch_add(1, Ordering::Relaxed);
    }

    // == Record Eviction ==
    /// Adds `count` entries reclaimed by the background sweep.
    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Reads every counter into a plain, serializable snapshot.
    pub fn snapshot(&self, total_entries: usize) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            query_misses: self.query_misses.load(Ordering::Relaxed),
            query_not_applicable: self.query_not_applicable.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            total_entries,
        }
    }
}

// == Stats Snapshot ==
/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Lookups that found a live entry
    pub hits: u64,
    /// Lookups that found nothing live (absent or expired)
    pub misses: u64,
    /// Lookups that found an expired entry
    pub expired: u64,
    /// Live lookups whose query path did not resolve
    pub query_misses: u64,
    /// Live lookups whose value was not structured data
    pub query_not_applicable: u64,
    /// Entries reclaimed by the background sweep
    pub evictions: u64,
    /// Current number of entries in the store
    pub total_entries: usize,
}

impl StatsSnapshot {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let snapshot = CacheStats::new().snapshot(0);
        assert_eq!(snapshot, StatsSnapshot::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::new().snapshot(0).hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.snapshot(0).hit_rate(), 0.5);
    }

    #[test]
    fn test_expired_counts_as_miss() {
        let stats = CacheStats::new();
        stats.record_expired();
        stats.record_miss();

        let snapshot = stats.snapshot(0);
        assert_eq!(snapshot.misses, 2);
        assert_eq!(snapshot.expired, 1);
    }

    #[test]
    fn test_query_outcomes_and_evictions() {
        let stats = CacheStats::new();
        stats.record_query_miss();
        stats.record_query_not_applicable();
        stats.record_query_not_applicable();
        stats.record_evictions(7);

        let snapshot = stats.snapshot(42);
        assert_eq!(snapshot.query_misses, 1);
        assert_eq!(snapshot.query_not_applicable, 2);
        assert_eq!(snapshot.evictions, 7);
        assert_eq!(snapshot.total_entries, 42);
    }
}
