//! Expiration Manager
//!
//! Two cooperating policies decide whether an entry is live:
//! - a lazy check on every read, which alone guarantees that expired data is
//!   never returned;
//! - a periodic sweep that reclaims entries which are written once and never
//!   read again.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{current_timestamp_ms, CacheEntry, CompositeKey, EntryStore};

// == Liveness ==
/// Result of the read-time liveness check.
#[derive(Debug, Clone)]
pub enum Liveness {
    Live(Arc<CacheEntry>),
    Expired,
    Absent,
}

// == Sweep Report ==
/// Counters from a single sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Keys found expired or corrupt in the snapshot
    pub candidates: usize,
    /// Keys actually evicted (a concurrent overwrite can save a candidate)
    pub evicted: usize,
    /// Evicted keys whose metadata was corrupt
    pub corrupt: usize,
}

// == Expiration Manager ==
#[derive(Debug, Clone)]
pub struct ExpirationManager {
    store: Arc<EntryStore>,
    batch_size: usize,
}

impl ExpirationManager {
    /// Creates a manager over `store` that evicts at most `batch_size` keys
    /// before yielding to other tasks.
    pub fn new(store: Arc<EntryStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    // == Lazy Check ==
    /// Looks `key` up and decides whether it is live right now.
    ///
    /// An expired entry is reported as [`Liveness::Expired`] and then removed
    /// from the store if it is still the same entry. The removal is cleanup
    /// only; the verdict does not depend on it.
    pub fn check(&self, key: &CompositeKey) -> Liveness {
        let Some(entry) = self.store.peek(key) else {
            return Liveness::Absent;
        };

        let now = current_timestamp_ms();
        if entry.is_expired_at(now) || entry.is_corrupt() {
            if self.store.remove_exact(key, &entry) {
                debug!("Lazily evicted expired entry {}", key);
            }
            return Liveness::Expired;
        }

        Liveness::Live(entry)
    }

    // == Sweep ==
    /// Evicts every entry that is expired at the start of the pass.
    ///
    /// The candidate list is a snapshot; each eviction re-checks the entry
    /// under its shard lock, so a key overwritten since the snapshot
    /// survives. The task yields after every `batch_size` evictions.
    pub async fn sweep(&self) -> SweepReport {
        let now = current_timestamp_ms();
        let candidates = self
            .store
            .keys_matching(|entry| entry.is_expired_at(now) || entry.is_corrupt());

        let mut report = SweepReport {
            candidates: candidates.len(),
            ..SweepReport::default()
        };

        for chunk in candidates.chunks(self.batch_size) {
            for key in chunk {
                let mut corrupt = false;
                let evicted = self.store.remove_if(key, |entry| {
                    corrupt = entry.is_corrupt();
                    corrupt || entry.is_expired_at(now)
                });

                if evicted {
                    report.evicted += 1;
                    if corrupt {
                        report.corrupt += 1;
                        warn!("Evicted entry {} with corrupt expiration metadata", key);
                    }
                }
            }
            tokio::task::yield_now().await;
        }

        report
    }
}
