//! In-process backend.
//!
//! Keeps the log in memory. Sharing one instance between two cache services
//! models a process restart; write failures can be switched on to exercise
//! the `PersistenceFailure` path.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{fold_records, Backend, DurableRecord, LogRecord, PersistenceError};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<Vec<LogRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `append` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of the raw log, oldest record first.
    pub async fn records(&self) -> Vec<LogRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn append(&self, record: &LogRecord) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(format!(
                "write of {} rejected",
                record
            )));
        }
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn compact(&self, now_ms: u64) -> Result<Vec<DurableRecord>, PersistenceError> {
        let mut records = self.records.lock().await;
        let survivors = fold_records(records.drain(..), now_ms);
        records.extend(survivors.iter().cloned().map(LogRecord::Put));
        Ok(survivors)
    }
}
