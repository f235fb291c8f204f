//! Cache Statistics Module
//!
//! Tracks cache activity: hits, misses, refused admissions and expiry
//! evictions. Counters are atomic so lookups can record under a shared lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Live activity counters owned by the cache store.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    rejected: AtomicU64,
    expired: AtomicU64,
}

/// Point-in-time copy of the counters plus occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups for absent or stale keys
    pub misses: u64,
    /// Admissions refused (duplicate key or cap reached)
    pub rejected: u64,
    /// Entries removed by the expiry sweep
    pub expired: u64,
    /// Current number of resident entries
    pub total_entries: usize,
    /// Current sum of resident body sizes
    pub resident_bytes: u64,
}

impl StatsSnapshot {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: usize) {
        self.expired.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Copies the counters, pairing them with the given occupancy figures.
    pub fn snapshot(&self, total_entries: usize, resident_bytes: u64) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            total_entries,
            resident_bytes,
        }
    }
}
