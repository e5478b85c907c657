//! Striped per-key write locks.
//!
//! Writers to the same key take the same stripe, so a `set` that has to touch
//! the backing store stays ordered with every other write to that key. Keys
//! on different stripes proceed in parallel; readers never take these locks.

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;

use tokio::sync::{Mutex, MutexGuard};

use crate::cache::CompositeKey;

/// Number of stripes used by [`KeyLocks::default`]
pub const DEFAULT_STRIPES: usize = 256;

#[derive(Debug)]
pub struct KeyLocks {
    stripes: Box<[Mutex<()>]>,
    hasher: RandomState,
}

impl KeyLocks {
    pub fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self {
            stripes,
            hasher: RandomState::new(),
        }
    }

    /// Waits for exclusive write access to `key`.
    pub async fn lock(&self, key: &CompositeKey) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_of(key)].lock().await
    }

    fn stripe_of(&self, key: &CompositeKey) -> usize {
        (self.hasher.hash_one(key) % self.stripes.len() as u64) as usize
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}
