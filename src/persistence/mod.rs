//! Persistence Layer
//!
//! Durable backing for entries written with [`PersistenceMode::Durable`].
//! The backing store is an ordered log of records keyed exactly like the
//! entry store. Replaying the log (last record per key wins), then dropping
//! tombstoned and expired keys, yields the durable state.
//!
//! Writes are synchronous from the caller's point of view: `append` returns
//! only once the record is on stable storage, and the cache service does not
//! publish a durable entry until then.
//!
//! [`PersistenceMode::Durable`]: crate::cache::PersistenceMode::Durable

mod file;
mod memory;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{CacheEntry, CompositeKey, PersistenceMode};

pub use file::FileBackend;
pub use memory::MemoryBackend;

// == Errors ==
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode log record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

// == Durable Record ==
/// One durable entry as stored in the backing log.
///
/// `expires_at` is stored precomputed, so TTL semantics survive restarts
/// without trusting the clock at load time for anything but the comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurableRecord {
    pub namespace: String,
    pub key: String,
    pub value: String,
    pub created_at: u64,
    pub expires_at: u64,
}

impl DurableRecord {
    pub fn from_entry(key: &CompositeKey, entry: &CacheEntry) -> Self {
        Self {
            namespace: key.namespace.clone(),
            key: key.key.clone(),
            value: entry.value.to_string(),
            created_at: entry.created_at,
            expires_at: entry.expires_at,
        }
    }

    pub fn composite_key(&self) -> CompositeKey {
        CompositeKey::new(self.namespace.as_str(), self.key.as_str())
    }

    pub fn into_entry(self) -> (CompositeKey, CacheEntry) {
        let key = CompositeKey::new(self.namespace, self.key);
        let entry = CacheEntry::from_parts(
            self.value,
            self.created_at,
            self.expires_at,
            PersistenceMode::Durable,
        );
        (key, entry)
    }
}

// == Log Record ==
/// A single line of the backing log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum LogRecord {
    /// Store or replace a durable entry
    Put(DurableRecord),
    /// Forget any durable entry for this key
    Del(CompositeKey),
}

impl LogRecord {
    pub fn key(&self) -> CompositeKey {
        match self {
            LogRecord::Put(record) => record.composite_key(),
            LogRecord::Del(key) => key.clone(),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Put(record) => write!(f, "put {}", record.composite_key()),
            LogRecord::Del(key) => write!(f, "del {}", key),
        }
    }
}

/// Folds log records in order into the surviving durable records.
///
/// The last record for a key wins; tombstoned keys and records expired at
/// `now_ms` are dropped.
pub fn fold_records<I>(records: I, now_ms: u64) -> Vec<DurableRecord>
where
    I: IntoIterator<Item = LogRecord>,
{
    let mut latest: HashMap<CompositeKey, Option<DurableRecord>> = HashMap::new();
    for record in records {
        match record {
            LogRecord::Put(put) => {
                latest.insert(put.composite_key(), Some(put));
            }
            LogRecord::Del(key) => {
                latest.insert(key, None);
            }
        }
    }

    latest
        .into_values()
        .flatten()
        .filter(|record| record.expires_at > now_ms && record.expires_at >= record.created_at)
        .collect()
}

// == Backend ==
/// Durable backing storage for the cache.
#[async_trait]
pub trait Backend: Send + Sync + fmt::Debug {
    /// Appends `record` and returns once it is durable.
    async fn append(&self, record: &LogRecord) -> Result<(), PersistenceError>;

    /// Rewrites the backing store to hold only the surviving records and
    /// returns them.
    async fn compact(&self, now_ms: u64) -> Result<Vec<DurableRecord>, PersistenceError>;
}
