//! Cache Service
//!
//! Orchestrates the entry store, expiration manager, persistence layer and
//! query engine behind the operations used by the request layer.
//!
//! # Durability
//! A `durable` write is appended to the backing store and synced before the
//! entry becomes visible and before `set` returns; if the append fails the
//! `set` fails and nothing is published. A non-durable write that replaces a
//! live durable entry first appends a tombstone, so the old value cannot come
//! back after a restart.
//!
//! # Startup
//! [`CacheService::open`] replays and compacts the backing store into the
//! entry store before returning, so the service never serves a `get` ahead
//! of replay.
//!
//! # Compaction
//! Every record appended while the service runs is counted. Once the count
//! reaches the configured threshold, [`CacheService::compact_if_due`] folds
//! the log down to its surviving records; the sweep task calls it after each
//! pass.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::cache::{
    current_timestamp_ms, CacheEntry, CacheStats, CompositeKey, EntryStore, ExpirationManager,
    KeyLocks, Liveness, Payload, PersistenceMode, StatsSnapshot, SweepReport, MAX_KEY_LENGTH,
    MAX_NAMESPACE_LENGTH, MAX_TTL_SECONDS, MAX_VALUE_SIZE,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::namespace::NamespaceRegistry;
use crate::persistence::{Backend, DurableRecord, FileBackend, LogRecord};
use crate::query::{self, Projection};

// == Get Outcome ==
/// Every defined result of a lookup. None of these is an error.
#[derive(Debug, Clone, PartialEq)]
pub enum GetOutcome {
    /// Live value, raw or projected by the query
    Value(Payload),
    /// No entry under the key
    NotFound,
    /// The entry's TTL has elapsed
    Expired,
    /// The query path does not resolve in the stored document
    QueryMiss,
    /// A query was given but the stored value is not structured data
    QueryNotApplicable,
}

// == Cache Service ==
#[derive(Debug)]
pub struct CacheService {
    store: Arc<EntryStore>,
    expiry: ExpirationManager,
    backend: Arc<dyn Backend>,
    namespaces: NamespaceRegistry,
    stats: CacheStats,
    locks: KeyLocks,
    /// Last commit sequence handed out by `set`
    commits: AtomicU64,
    /// Records appended since the log was last compacted
    appended: AtomicU64,
    compact_threshold: u64,
}

impl CacheService {
    // == Constructors ==
    /// Opens the durable log named by the configuration and restores it.
    pub async fn open(config: &Config) -> Result<Self> {
        let backend = FileBackend::open(&config.data_path).await?;
        Self::with_backend(Arc::new(backend), config).await
    }

    /// Builds a service over `backend`, restoring every surviving durable
    /// entry before returning.
    pub async fn with_backend(backend: Arc<dyn Backend>, config: &Config) -> Result<Self> {
        let store = Arc::new(EntryStore::new());

        let survivors = backend.compact(current_timestamp_ms()).await?;
        let restored = survivors.len();
        for record in survivors {
            let (key, entry) = record.into_entry();
            store.put(key, Arc::new(entry));
        }
        info!("Restored {} durable entries", restored);

        Ok(Self {
            expiry: ExpirationManager::new(Arc::clone(&store), config.sweep_batch_size),
            store,
            backend,
            namespaces: NamespaceRegistry::new(config.public_base_url()),
            stats: CacheStats::new(),
            locks: KeyLocks::default(),
            commits: AtomicU64::new(0),
            appended: AtomicU64::new(0),
            compact_threshold: config.compact_threshold.max(1),
        })
    }

    // == Initialize ==
    /// Registers `namespace` and returns its routing address.
    pub fn initialize(&self, name: &str, email: &str, namespace: &str) -> Result<String> {
        validate_namespace(namespace)?;
        Ok(self.namespaces.register(name, email, namespace))
    }

    // == Set ==
    /// Stores `value` under `namespace:key` for `ttl_seconds`, replacing any
    /// existing entry.
    ///
    /// Returns the write's commit sequence. Writes to one key become visible
    /// in increasing sequence order, so the highest sequence is the value a
    /// later `get` sees.
    pub async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
        ttl_seconds: i64,
        persistence: PersistenceMode,
    ) -> Result<u64> {
        let ttl = validate_set(namespace, key, value, ttl_seconds)?;
        let composite = CompositeKey::new(namespace, key);

        let _guard = self.locks.lock(&composite).await;
        let entry = Arc::new(CacheEntry::new(value, ttl, persistence));

        if persistence.is_durable() {
            let record = DurableRecord::from_entry(&composite, &entry);
            self.persist(LogRecord::Put(record)).await?;
        } else if self.holds_live_durable(&composite) {
            self.persist(LogRecord::Del(composite.clone())).await?;
        }

        let sequence = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "Set {} (ttl={}s, persistence={}, seq={})",
            composite, ttl, persistence, sequence
        );
        self.store.put(composite, entry);
        Ok(sequence)
    }

    // == Get ==
    /// Looks up `namespace:key`, optionally projecting `query` out of the
    /// stored value.
    pub fn get(&self, namespace: &str, key: &str, query: Option<&str>) -> GetOutcome {
        let composite = CompositeKey::new(namespace, key);

        let entry = match self.expiry.check(&composite) {
            Liveness::Live(entry) => entry,
            Liveness::Absent => {
                self.stats.record_miss();
                debug!("Get {}: not found", composite);
                return GetOutcome::NotFound;
            }
            Liveness::Expired => {
                self.stats.record_expired();
                debug!("Get {}: expired", composite);
                return GetOutcome::Expired;
            }
        };

        self.stats.record_hit();
        let Some(query) = query else {
            return GetOutcome::Value(Payload::Raw(Arc::clone(&entry.value)));
        };

        match query::project(&entry, query) {
            Projection::Found(value) => GetOutcome::Value(Payload::Structured(value)),
            Projection::Miss => {
                self.stats.record_query_miss();
                GetOutcome::QueryMiss
            }
            Projection::NotApplicable => {
                self.stats.record_query_not_applicable();
                GetOutcome::QueryNotApplicable
            }
        }
    }

    // == Delete ==
    /// Removes `namespace:key`, returning whether a live entry was removed.
    pub async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let composite = CompositeKey::new(namespace, key);

        let _guard = self.locks.lock(&composite).await;
        if self.holds_live_durable(&composite) {
            self.persist(LogRecord::Del(composite.clone())).await?;
        }

        let removed = self
            .store
            .remove(&composite)
            .is_some_and(|entry| !entry.is_expired());
        debug!("Delete {}: removed={}", composite, removed);
        Ok(removed)
    }

    // == Exists ==
    /// Whether a live entry is stored under `namespace:key`.
    pub fn exists(&self, namespace: &str, key: &str) -> bool {
        matches!(
            self.expiry.check(&CompositeKey::new(namespace, key)),
            Liveness::Live(_)
        )
    }

    // == Maintenance ==
    /// Runs one expiration sweep over the whole store.
    pub async fn sweep(&self) -> SweepReport {
        let report = self.expiry.sweep().await;
        self.stats.record_evictions(report.evicted as u64);
        report
    }

    /// Compacts the backing store, returning the number of durable records kept.
    pub async fn compact(&self) -> Result<usize> {
        let pending = self.appended.swap(0, Ordering::SeqCst);
        match self.backend.compact(current_timestamp_ms()).await {
            Ok(survivors) => Ok(survivors.len()),
            Err(e) => {
                self.appended.fetch_add(pending, Ordering::SeqCst);
                error!("Log compaction failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Compacts the backing store once enough records have been appended
    /// since the last compaction. Returns `None` when it is not yet due.
    pub async fn compact_if_due(&self) -> Result<Option<usize>> {
        if self.appended.load(Ordering::SeqCst) < self.compact_threshold {
            return Ok(None);
        }
        self.compact().await.map(Some)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.store.len())
    }

    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn holds_live_durable(&self, key: &CompositeKey) -> bool {
        self.store
            .peek(key)
            .is_some_and(|entry| entry.persistence.is_durable() && !entry.is_expired())
    }

    async fn persist(&self, record: LogRecord) -> Result<()> {
        self.backend.append(&record).await.map_err(|e| {
            error!("Durable write ({}) failed: {}", record, e);
            CacheError::from(e)
        })?;
        self.appended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// == Validation ==
fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Err(CacheError::InvalidArgument(
            "Namespace cannot be empty".to_string(),
        ));
    }
    if namespace.len() > MAX_NAMESPACE_LENGTH {
        return Err(CacheError::InvalidArgument(format!(
            "Namespace exceeds maximum length of {} bytes",
            MAX_NAMESPACE_LENGTH
        )));
    }
    Ok(())
}

/// Checks `set` input and returns the TTL to apply, capped at
/// [`MAX_TTL_SECONDS`].
fn validate_set(namespace: &str, key: &str, value: &str, ttl_seconds: i64) -> Result<u64> {
    validate_namespace(namespace)?;

    if key.is_empty() {
        return Err(CacheError::InvalidArgument("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidArgument(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    if value.is_empty() {
        return Err(CacheError::InvalidArgument(
            "Value cannot be empty".to_string(),
        ));
    }
    if value.len() > MAX_VALUE_SIZE {
        return Err(CacheError::InvalidArgument(format!(
            "Value exceeds maximum size of {} bytes",
            MAX_VALUE_SIZE
        )));
    }
    if ttl_seconds <= 0 {
        return Err(CacheError::InvalidArgument(format!(
            "TTL must be positive, got {}",
            ttl_seconds
        )));
    }

    Ok((ttl_seconds as u64).min(MAX_TTL_SECONDS))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryBackend;
    use serde_json::json;
    use std::thread::sleep;
    use std::time::Duration;

    async fn service_with(backend: Arc<MemoryBackend>) -> CacheService {
        CacheService::with_backend(backend, &Config::default())
            .await
            .unwrap()
    }

    async fn service() -> CacheService {
        service_with(Arc::new(MemoryBackend::new())).await
    }

    async fn service_compacting_every(
        backend: Arc<MemoryBackend>,
        compact_threshold: u64,
    ) -> CacheService {
        let config = Config {
            compact_threshold,
            ..Config::default()
        };
        CacheService::with_backend(backend, &config).await.unwrap()
    }

    fn raw(value: &str) -> GetOutcome {
        GetOutcome::Value(Payload::Raw(Arc::from(value)))
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = service().await;
        cache
            .set("db", "key1", "value1", 60, PersistenceMode::None)
            .await
            .unwrap();

        assert_eq!(cache.get("db", "key1", None), raw("value1"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let cache = service().await;
        assert_eq!(cache.get("db", "missing", None), GetOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_set_rejects_invalid_arguments() {
        let cache = service().await;
        let mode = PersistenceMode::None;

        for (namespace, key, value, ttl) in [
            ("db", "", "v", 60),
            ("db", "k", "", 60),
            ("db", "k", "v", 0),
            ("db", "k", "v", -5),
            ("", "k", "v", 60),
        ] {
            let result = cache.set(namespace, key, value, ttl, mode).await;
            assert!(
                matches!(result, Err(CacheError::InvalidArgument(_))),
                "expected rejection for {:?}",
                (namespace, key, value, ttl)
            );
        }

        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);
        assert!(cache.set("db", &long_key, "v", 60, mode).await.is_err());

        let large_value = "x".repeat(MAX_VALUE_SIZE + 1);
        assert!(cache.set("db", "k", &large_value, 60, mode).await.is_err());

        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_resets_ttl() {
        let cache = service().await;
        cache
            .set("db", "k", "v1", 1, PersistenceMode::None)
            .await
            .unwrap();
        cache
            .set("db", "k", "v2", 60, PersistenceMode::None)
            .await
            .unwrap();

        sleep(Duration::from_millis(1100));

        assert_eq!(cache.get("db", "k", None), raw("v2"));
    }

    #[tokio::test]
    async fn test_expired_never_returned() {
        let cache = service().await;
        cache
            .set("db", "k", "v", 1, PersistenceMode::None)
            .await
            .unwrap();

        sleep(Duration::from_millis(1100));

        assert_eq!(cache.get("db", "k", None), GetOutcome::Expired);
        assert_eq!(cache.get("db", "k", None), GetOutcome::NotFound);
        assert!(!cache.exists("db", "k"));

        let stats = cache.stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.misses, 2);
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let cache = service().await;
        cache
            .set("a", "k", "v", 60, PersistenceMode::None)
            .await
            .unwrap();

        assert_eq!(cache.get("b", "k", None), GetOutcome::NotFound);
        assert_eq!(cache.get("a", "k", None), raw("v"));
    }

    #[tokio::test]
    async fn test_query_projection() {
        let cache = service().await;
        cache
            .set("db", "doc", r#"{"a":{"b":42}}"#, 60, PersistenceMode::None)
            .await
            .unwrap();
        cache
            .set("db", "text", "plain", 60, PersistenceMode::None)
            .await
            .unwrap();

        assert_eq!(
            cache.get("db", "doc", Some("a.b")),
            GetOutcome::Value(Payload::Structured(json!(42)))
        );
        assert_eq!(cache.get("db", "doc", Some("a.c")), GetOutcome::QueryMiss);
        assert_eq!(
            cache.get("db", "text", Some("a")),
            GetOutcome::QueryNotApplicable
        );

        let stats = cache.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.query_misses, 1);
        assert_eq!(stats.query_not_applicable, 1);
    }

    #[tokio::test]
    async fn test_durable_write_is_logged() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = service_with(Arc::clone(&backend)).await;

        cache
            .set("db", "k", "v", 60, PersistenceMode::Durable)
            .await
            .unwrap();
        cache
            .set("db", "s", "v", 60, PersistenceMode::Session)
            .await
            .unwrap();

        let records = backend.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key(), CompositeKey::new("db", "k"));
    }

    #[tokio::test]
    async fn test_persistence_failure_publishes_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = service_with(Arc::clone(&backend)).await;
        cache
            .set("db", "k", "old", 60, PersistenceMode::None)
            .await
            .unwrap();

        backend.set_fail_writes(true);
        let result = cache
            .set("db", "k", "new", 60, PersistenceMode::Durable)
            .await;

        assert!(matches!(result, Err(CacheError::Persistence(_))));
        assert_eq!(cache.get("db", "k", None), raw("old"));
    }

    #[tokio::test]
    async fn test_restart_restores_durable_only() {
        let backend = Arc::new(MemoryBackend::new());
        {
            let cache = service_with(Arc::clone(&backend)).await;
            for (key, mode) in [
                ("durable", PersistenceMode::Durable),
                ("session", PersistenceMode::Session),
                ("none", PersistenceMode::None),
            ] {
                cache.set("db", key, "v", 60, mode).await.unwrap();
            }
        }

        let restarted = service_with(backend).await;
        assert_eq!(restarted.get("db", "durable", None), raw("v"));
        assert_eq!(restarted.get("db", "session", None), GetOutcome::NotFound);
        assert_eq!(restarted.get("db", "none", None), GetOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_session_overwrite_of_durable_does_not_resurrect() {
        let backend = Arc::new(MemoryBackend::new());
        {
            let cache = service_with(Arc::clone(&backend)).await;
            cache
                .set("db", "k", "durable", 60, PersistenceMode::Durable)
                .await
                .unwrap();
            cache
                .set("db", "k", "session", 60, PersistenceMode::Session)
                .await
                .unwrap();
            assert_eq!(cache.get("db", "k", None), raw("session"));
        }

        let restarted = service_with(backend).await;
        assert_eq!(restarted.get("db", "k", None), GetOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_tombstone_failure_fails_set() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = service_with(Arc::clone(&backend)).await;
        cache
            .set("db", "k", "durable", 60, PersistenceMode::Durable)
            .await
            .unwrap();

        backend.set_fail_writes(true);
        let result = cache
            .set("db", "k", "session", 60, PersistenceMode::Session)
            .await;

        assert!(matches!(result, Err(CacheError::Persistence(_))));
        assert_eq!(cache.get("db", "k", None), raw("durable"));
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = service_with(Arc::clone(&backend)).await;
        cache
            .set("db", "k", "v", 60, PersistenceMode::Durable)
            .await
            .unwrap();

        assert!(cache.delete("db", "k").await.unwrap());
        assert!(!cache.delete("db", "k").await.unwrap());
        assert_eq!(cache.get("db", "k", None), GetOutcome::NotFound);

        let restarted = service_with(backend).await;
        assert!(!restarted.exists("db", "k"));
    }

    #[tokio::test]
    async fn test_initialize() {
        let cache = service().await;
        let address = cache
            .initialize("Test User", "test.user@example.com", "workflow")
            .unwrap();

        assert_eq!(address, "http://localhost:3000/workflow");
        assert!(cache.namespaces().get("workflow").is_some());
        assert!(matches!(
            cache.initialize("n", "e", ""),
            Err(CacheError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_unregistered_namespace_still_usable() {
        let cache = service().await;
        cache
            .set("never-initialized", "k", "v", 60, PersistenceMode::None)
            .await
            .unwrap();
        assert!(cache.exists("never-initialized", "k"));
    }

    #[tokio::test]
    async fn test_sweep_records_evictions() {
        let cache = service().await;
        cache
            .set("db", "short", "v", 1, PersistenceMode::None)
            .await
            .unwrap();
        cache
            .set("db", "long", "v", 60, PersistenceMode::None)
            .await
            .unwrap();

        sleep(Duration::from_millis(1100));

        let report = cache.sweep().await;
        assert_eq!(report.evicted, 1);
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_compact() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = service_with(Arc::clone(&backend)).await;
        for value in ["v1", "v2", "v3"] {
            cache
                .set("db", "k", value, 60, PersistenceMode::Durable)
                .await
                .unwrap();
        }

        assert_eq!(cache.compact().await.unwrap(), 1);
        assert_eq!(backend.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_compact_if_due() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = service_compacting_every(Arc::clone(&backend), 4).await;

        for i in 0..3 {
            cache
                .set("db", "k", &format!("v{}", i), 60, PersistenceMode::Durable)
                .await
                .unwrap();
        }
        assert_eq!(cache.compact_if_due().await.unwrap(), None);
        assert_eq!(backend.records().await.len(), 3);

        cache
            .set("db", "k", "v3", 60, PersistenceMode::Durable)
            .await
            .unwrap();
        assert_eq!(cache.compact_if_due().await.unwrap(), Some(1));
        assert_eq!(backend.records().await.len(), 1);

        // The counter restarts after a compaction.
        assert_eq!(cache.compact_if_due().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_runtime_overwrites_keep_log_bounded() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = service_compacting_every(Arc::clone(&backend), 8).await;

        for i in 0..200 {
            cache
                .set("db", "hot", &format!("v{}", i), 60, PersistenceMode::Durable)
                .await
                .unwrap();
            cache.compact_if_due().await.unwrap();
            assert!(backend.records().await.len() <= 8);
        }

        let restarted = service_with(backend).await;
        assert_eq!(restarted.get("db", "hot", None), raw("v199"));
    }

    #[tokio::test]
    async fn test_set_sequences_increase() {
        let cache = service().await;
        let first = cache
            .set("db", "a", "v", 60, PersistenceMode::None)
            .await
            .unwrap();
        let second = cache
            .set("db", "b", "v", 60, PersistenceMode::None)
            .await
            .unwrap();
        assert!(second > first);

        // Rejected writes do not consume a sequence.
        assert!(cache.set("db", "", "v", 60, PersistenceMode::None).await.is_err());
        let third = cache
            .set("db", "a", "v", 60, PersistenceMode::None)
            .await
            .unwrap();
        assert_eq!(third, second + 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_same_key() {
        let cache = Arc::new(service().await);

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    let mode = if i % 2 == 0 {
                        PersistenceMode::Durable
                    } else {
                        PersistenceMode::None
                    };
                    let value = format!("value-{}", i);
                    let sequence = cache
                        .set("db", "contended", &value, 60, mode)
                        .await
                        .unwrap();
                    (sequence, value)
                })
            })
            .collect();

        let mut commits = Vec::new();
        for handle in handles {
            commits.push(handle.await.unwrap());
        }

        let (_, last_committed) = commits
            .iter()
            .max_by_key(|(sequence, _)| *sequence)
            .unwrap();
        assert_eq!(cache.get("db", "contended", None), raw(last_committed));
        assert_eq!(cache.len(), 1);
    }
}
