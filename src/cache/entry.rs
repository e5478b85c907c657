//! Cache Entry Module
//!
//! Defines the composite key, the persistence mode and the individual cache
//! entry with its expiration metadata.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query;

// == Composite Key ==
/// The store's sole index: a namespace paired with a caller-supplied key.
///
/// Both parts take part in equality and hashing, so `("a:b", "c")` and
/// `("a", "b:c")` are distinct keys even though they render identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    pub namespace: String,
    pub key: String,
}

impl CompositeKey {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.key)
    }
}

// == Persistence Mode ==
/// Durability policy attached to an entry.
///
/// | mode      | written to backing store | restored on restart |
/// |-----------|--------------------------|---------------------|
/// | `None`    | no                       | no                  |
/// | `Session` | no                       | no                  |
/// | `Durable` | yes, before `set` returns | yes                |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    #[default]
    None,
    Session,
    Durable,
}

impl PersistenceMode {
    pub fn is_durable(self) -> bool {
        matches!(self, PersistenceMode::Durable)
    }
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PersistenceMode::None => "none",
            PersistenceMode::Session => "session",
            PersistenceMode::Durable => "durable",
        };
        f.write_str(name)
    }
}

// == Payload ==
/// A value handed back to callers: either the stored bytes verbatim or a
/// structured sub-document produced by a query projection.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Raw(Arc<str>),
    Structured(Value),
}

impl Payload {
    /// Renders the payload as JSON for the request layer. Raw payloads become
    /// JSON strings, structured payloads are passed through unchanged.
    pub fn into_json(self) -> Value {
        match self {
            Payload::Raw(raw) => Value::String(raw.to_string()),
            Payload::Structured(value) => value,
        }
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug)]
pub struct CacheEntry {
    /// The stored value, never interpreted by the store itself
    pub value: Arc<str>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Durability policy the entry was written with
    pub persistence: PersistenceMode,
    /// Structured view of `value`, parsed on first query
    document: OnceLock<Option<Value>>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl_seconds` from now.
    pub fn new(value: impl Into<Arc<str>>, ttl_seconds: u64, persistence: PersistenceMode) -> Self {
        let now = current_timestamp_ms();
        let expires_at = now.saturating_add(ttl_seconds.saturating_mul(1000));
        Self::from_parts(value, now, expires_at, persistence)
    }

    /// Rebuilds an entry from stored metadata, used when replaying the
    /// backing store.
    pub fn from_parts(
        value: impl Into<Arc<str>>,
        created_at: u64,
        expires_at: u64,
        persistence: PersistenceMode,
    ) -> Self {
        Self {
            value: value.into(),
            created_at,
            expires_at,
            persistence,
            document: OnceLock::new(),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at the given instant.
    ///
    /// Boundary condition: an entry is expired once `now >= expires_at`.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    /// Checks if the entry has expired against the system clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Metadata that can never come out of [`CacheEntry::new`]: an expiry
    /// earlier than the creation time.
    pub fn is_corrupt(&self) -> bool {
        self.expires_at < self.created_at
    }

    // == Document ==
    /// Structured view of the value, or `None` when the value is not a JSON
    /// object or array (or nests deeper than the query engine accepts).
    ///
    /// Parsing happens at most once per entry.
    pub fn document(&self) -> Option<&Value> {
        self.document
            .get_or_init(|| query::parse_document(&self.value))
            .as_ref()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
