//! Entry Store Module
//!
//! Concurrent mapping from composite key to entry, backed by a sharded
//! `DashMap`. Readers and writers on different keys never contend on a
//! store-wide lock; every mutation of a single key is atomic.

use std::sync::Arc;

use dashmap::DashMap;

use crate::cache::{CacheEntry, CompositeKey};

// == Entry Store ==
/// In-memory entry storage.
///
/// Entries are stored behind `Arc` so `peek` hands out a complete snapshot
/// without holding a shard lock past the call.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: DashMap<CompositeKey, Arc<CacheEntry>>,
}

impl EntryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Put ==
    /// Replaces any existing entry unconditionally, returning the previous one.
    pub fn put(&self, key: CompositeKey, entry: Arc<CacheEntry>) -> Option<Arc<CacheEntry>> {
        self.entries.insert(key, entry)
    }

    // == Peek ==
    /// Returns the entry stored under `key` without evaluating liveness.
    pub fn peek(&self, key: &CompositeKey) -> Option<Arc<CacheEntry>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    // == Remove ==
    /// Removes `key`. Removing an absent key is not an error.
    pub fn remove(&self, key: &CompositeKey) -> Option<Arc<CacheEntry>> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Removes `key` only while it still holds exactly `expected`.
    ///
    /// Used for eviction: a concurrent `put` that already replaced the
    /// observed entry is left untouched.
    pub fn remove_exact(&self, key: &CompositeKey, expected: &Arc<CacheEntry>) -> bool {
        self.entries
            .remove_if(key, |_, current| Arc::ptr_eq(current, expected))
            .is_some()
    }

    /// Removes `key` if the entry stored under it matches `predicate` at the
    /// moment of removal.
    pub fn remove_if<F>(&self, key: &CompositeKey, predicate: F) -> bool
    where
        F: FnOnce(&CacheEntry) -> bool,
    {
        self.entries
            .remove_if(key, |_, current| predicate(current.as_ref()))
            .is_some()
    }

    // == Scan ==
    /// Collects the keys whose entries match `predicate`.
    ///
    /// Each shard is read-locked only while it is being visited; the result
    /// is a snapshot and may be stale by the time it is used.
    pub fn keys_matching<F>(&self, mut predicate: F) -> Vec<CompositeKey>
    where
        F: FnMut(&CacheEntry) -> bool,
    {
        self.entries
            .iter()
            .filter(|item| predicate(item.value().as_ref()))
            .map(|item| item.key().clone())
            .collect()
    }

    // == Length ==
    /// Returns the current number of entries, including expired ones not yet
    /// reclaimed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
