//! Expiry Sweep Task
//!
//! Background task that periodically evicts expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;

/// How long `shutdown` waits for an in-progress sweep before aborting it.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Control handle for a running sweep task.
#[derive(Debug)]
pub struct SweepHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Stops the sweep task.
    ///
    /// Signals the task and waits up to `grace` for it to finish the sweep
    /// it may be running; if it has not returned by then it is aborted.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.stop_tx.send(true);

        let mut task = self.task;
        match tokio::time::timeout(grace, &mut task).await {
            Ok(_) => debug!("Sweep task stopped"),
            Err(_) => {
                warn!(?grace, "Sweep task did not stop in time, aborting");
                task.abort();
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns a background task that periodically sweeps expired entries.
///
/// The first sweep runs immediately, then once per `interval`. Each sweep
/// takes the store's write lock, so it is serialized with every other
/// mutation of the cache.
///
/// # Arguments
/// * `store` - Shared cache store
/// * `interval` - Time between sweeps
///
/// # Example
/// ```ignore
/// let store = Arc::new(RwLock::new(CacheStore::new(1000, 1 << 20, ttl)));
/// let sweeper = spawn_sweep_task(store.clone(), Duration::from_secs(600));
/// // Later, during shutdown:
/// sweeper.shutdown(SHUTDOWN_GRACE).await;
/// ```
pub fn spawn_sweep_task(store: Arc<RwLock<CacheStore>>, interval: Duration) -> SweepHandle {
    let interval = interval.max(MIN_SWEEP_INTERVAL);
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        info!(?interval, "Starting cache sweep task");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (removed, resident_bytes) = {
                        let mut guard = store.write().await;
                        let removed = guard.sweep_expired(Utc::now());
                        (removed, guard.resident_bytes())
                    };

                    if removed > 0 {
                        info!(removed, resident_bytes, "Cache sweep evicted expired entries");
                    } else {
                        debug!(resident_bytes, "Cache sweep found no expired entries");
                    }
                }
                _ = stop_rx.changed() => break,
            }
        }

        debug!("Cache sweep task exiting");
    });

    SweepHandle { stop_tx, task }
}
