//! Shared Cache Handle
//!
//! Wraps the store in `Arc<RwLock<>>` for concurrent use by connection
//! handlers, the operator console and the sweep task. Lookups share the
//! read lock; every mutation (`add`, `remove`, `clear`, the sweep) takes
//! the write lock, so capacity checks and updates never interleave.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::cache::{CacheEntry, CacheStore, EntryInfo, KeyPattern, StatsSnapshot};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::tasks::{spawn_sweep_task, SweepHandle, SHUTDOWN_GRACE};

/// Process-wide response cache.
///
/// Cloning yields another handle to the same cache. The sweep task is
/// started by the constructor and stopped by [`Cache::shutdown`].
#[derive(Debug, Clone)]
pub struct Cache {
    store: Arc<RwLock<CacheStore>>,
    sweeper: Arc<Mutex<Option<SweepHandle>>>,
}

impl Cache {
    /// Creates the cache described by `config` and starts its sweep task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_store(CacheStore::from_config(config), config.sweep_interval)
    }

    /// Wraps an existing store, sweeping it every `sweep_interval`.
    pub fn with_store(store: CacheStore, sweep_interval: Duration) -> Self {
        let store = Arc::new(RwLock::new(store));
        let sweeper = spawn_sweep_task(store.clone(), sweep_interval);

        Self {
            store,
            sweeper: Arc::new(Mutex::new(Some(sweeper))),
        }
    }

    /// Admits `body` under `key`. Returns false if the cache refused it.
    pub async fn add(&self, key: &str, body: Bytes, content_type: &str) -> bool {
        self.store.write().await.add(key, body, content_type)
    }

    /// Returns the fresh entry for `key`, or None on a miss.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.store.read().await.get(key)
    }

    /// Removes the keys selected by `pattern`, exact or glob.
    ///
    /// Returns the number of removed entries.
    pub async fn remove(&self, pattern: &str) -> Result<usize> {
        let pattern = KeyPattern::parse(pattern)?;
        let removed = self.store.write().await.remove(&pattern);

        info!(pattern = pattern.as_str(), removed, "Cache entries removed");
        Ok(removed)
    }

    /// Empties the cache, returning how many entries were dropped.
    pub async fn clear(&self) -> usize {
        let cleared = self.store.write().await.clear();
        info!(cleared, "Cache cleared");
        cleared
    }

    /// Runs one expiry sweep immediately.
    pub async fn sweep(&self) -> usize {
        self.store.write().await.sweep_expired(chrono::Utc::now())
    }

    pub async fn entries(&self) -> Vec<EntryInfo> {
        self.store.read().await.entries()
    }

    pub async fn stats(&self) -> StatsSnapshot {
        self.store.read().await.stats()
    }

    /// Stops the background sweep. Later calls are no-ops.
    pub async fn shutdown(&self) {
        self.shutdown_with_grace(SHUTDOWN_GRACE).await;
    }

    /// Stops the background sweep, aborting it after `grace`.
    pub async fn shutdown_with_grace(&self, grace: Duration) {
        let sweeper = self.sweeper.lock().await.take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown(grace).await;
            info!("Cache sweep stopped");
        }
    }
}
