//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{EntryInfo, StatsSnapshot};

/// Response body for listing entries (GET /entries)
#[derive(Debug, Clone, Serialize)]
pub struct EntriesResponse {
    /// Resident entries, stale ones included until swept
    pub entries: Vec<EntryInfo>,
    /// Sum of resident body sizes
    pub resident_bytes: u64,
}

impl EntriesResponse {
    pub fn new(entries: Vec<EntryInfo>) -> Self {
        let resident_bytes = entries.iter().map(|entry| entry.size).sum();
        Self {
            entries,
            resident_bytes,
        }
    }
}

/// Response body for removing entries (POST /entries/remove)
#[derive(Debug, Clone, Serialize)]
pub struct RemoveResponse {
    /// The pattern that was applied
    pub pattern: String,
    /// Number of entries deleted
    pub removed: usize,
}

impl RemoveResponse {
    pub fn new(pattern: impl Into<String>, removed: usize) -> Self {
        Self {
            pattern: pattern.into(),
            removed,
        }
    }
}

/// Response body for clearing the cache (DELETE /entries)
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub cleared: usize,
}

impl ClearResponse {
    pub fn new(cleared: usize) -> Self {
        Self {
            message: format!("Cache cleared, {} entries removed", cleared),
            cleared,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of refused admissions
    pub rejected: u64,
    /// Number of entries evicted by the sweep
    pub expired: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Current resident bytes
    pub resident_bytes: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<StatsSnapshot> for StatsResponse {
    fn from(stats: StatsSnapshot) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            rejected: stats.rejected,
            expired: stats.expired,
            total_entries: stats.total_entries,
            resident_bytes: stats.resident_bytes,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
