//! Expiration Sweep Task
//!
//! Background task that periodically evicts expired cache entries, bounding
//! memory held by keys that are written once and never read again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::service::CacheService;

/// Spawns a background task that sweeps expired entries every
/// `sweep_interval_secs` seconds, then compacts the durable log if enough
/// records have been appended since the last compaction.
///
/// Each pass works from a snapshot of expired keys and evicts them one at a
/// time, yielding between chunks, so concurrent `get`/`set` calls are never
/// blocked behind a full scan.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let service = Arc::new(CacheService::open(&config).await?);
/// let sweep_handle = spawn_sweep_task(service.clone(), 1);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: Arc<CacheService>, sweep_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expiration sweep task with interval of {} seconds",
            sweep_interval_secs
        );

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; wait a full interval instead.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let report = cache.sweep().await;

            if report.evicted > 0 {
                info!(
                    "Expiration sweep: evicted {} of {} expired entries ({} corrupt)",
                    report.evicted, report.candidates, report.corrupt
                );
            } else {
                debug!("Expiration sweep: no expired entries found");
            }

            match cache.compact_if_due().await {
                Ok(Some(kept)) => info!("Durable log compacted to {} records", kept),
                Ok(None) => {}
                Err(e) => error!("Durable log compaction failed: {}", e),
            }
        }
    })
}
