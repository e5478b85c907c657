//! Cache Module
//!
//! Provides the in-memory entry store, TTL expiration and lookup statistics.

mod entry;
mod expiry;
mod locks;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, CompositeKey, Payload, PersistenceMode};
pub use expiry::{ExpirationManager, Liveness, SweepReport};
pub use locks::KeyLocks;
pub use stats::{CacheStats, StatsSnapshot};
pub use store::EntryStore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed namespace length in bytes
pub const MAX_NAMESPACE_LENGTH: usize = 128;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

/// TTLs are capped at roughly 100 years
pub const MAX_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;
