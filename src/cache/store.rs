//! Cache Store Module
//!
//! Synchronous cache core: keyed entries, resident byte accounting and
//! admission control against the entry-count and byte caps.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, KeyPattern, StatsSnapshot};
use crate::config::CacheConfig;

/// Summary of one resident entry, used by `show` and the admin API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub expires_at: DateTime<Utc>,
}

// == Cache Store ==
/// Bounded URL-keyed store with lazy expiry.
///
/// Invariant: `resident_bytes` is the sum of the body sizes of all
/// resident entries, and after every mutation `len() <= max_entries`
/// and `resident_bytes <= max_bytes`.
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    resident_bytes: u64,
    max_entries: usize,
    max_bytes: u64,
    ttl: TimeDelta,
    stats: CacheStats,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store with the given caps and TTL.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of resident entries
    /// * `max_bytes` - Maximum sum of resident body sizes
    /// * `ttl` - Lifetime granted to each admitted entry
    pub fn new(max_entries: usize, max_bytes: u64, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            resident_bytes: 0,
            max_entries,
            max_bytes,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            stats: CacheStats::new(),
        }
    }

    /// Creates an empty store from loaded configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.max_bytes, config.ttl)
    }

    // == Add ==
    /// Admits a new entry under `key`, expiring one TTL from now.
    ///
    /// Returns false without touching the store if the key is already
    /// resident, if the body would push resident bytes past the byte cap,
    /// or if the entry cap is reached.
    pub fn add(&mut self, key: &str, body: Bytes, content_type: &str) -> bool {
        self.add_at(key, body, content_type, Utc::now())
    }

    pub(crate) fn add_at(
        &mut self,
        key: &str,
        body: Bytes,
        content_type: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let size = body.len() as u64;

        if self.entries.contains_key(key) {
            debug!(key, "Admission refused: key already cached");
            self.stats.record_rejection();
            return false;
        }

        if self.resident_bytes.saturating_add(size) > self.max_bytes {
            debug!(
                key,
                size,
                resident_bytes = self.resident_bytes,
                max_bytes = self.max_bytes,
                "Admission refused: byte cap would be exceeded"
            );
            self.stats.record_rejection();
            return false;
        }

        if self.entries.len() >= self.max_entries {
            debug!(
                key,
                max_entries = self.max_entries,
                "Admission refused: entry cap reached"
            );
            self.stats.record_rejection();
            return false;
        }

        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries.insert(
            key.to_string(),
            CacheEntry::new(body, content_type, expires_at),
        );
        self.resident_bytes += size;

        debug!(
            key,
            size,
            resident_bytes = self.resident_bytes,
            "Entry cached"
        );
        true
    }

    // == Get ==
    /// Returns the entry for `key` if it is resident and still fresh.
    ///
    /// Stale entries are reported as misses but left in place for the
    /// sweep to evict.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.get_at(key, Utc::now())
    }

    pub(crate) fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                self.stats.record_hit();
                Some(entry.clone())
            }
            _ => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Remove ==
    /// Deletes every resident key selected by `pattern`.
    ///
    /// Returns the number of entries removed.
    pub fn remove(&mut self, pattern: &KeyPattern) -> usize {
        if let KeyPattern::Exact(key) = pattern {
            return match self.entries.remove(key.as_str()) {
                Some(entry) => {
                    self.resident_bytes -= entry.size();
                    1
                }
                None => 0,
            };
        }

        let before = self.entries.len();
        let mut freed = 0;
        self.entries.retain(|key, entry| {
            if pattern.matches(key) {
                freed += entry.size();
                false
            } else {
                true
            }
        });
        self.resident_bytes -= freed;

        before - self.entries.len()
    }

    // == Clear ==
    /// Drops every entry. Returns how many were resident.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.resident_bytes = 0;
        count
    }

    // == Sweep ==
    /// Removes all entries that are stale at `now`.
    ///
    /// Returns the number of entries removed; fresh entries are untouched.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let mut freed = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired_at(now) {
                freed += entry.size();
                false
            } else {
                true
            }
        });
        self.resident_bytes -= freed;

        let removed = before - self.entries.len();
        self.stats.record_expired(removed);
        removed
    }

    // == Inspection ==
    /// Lists resident entries, expired ones included, sorted by key.
    pub fn entries(&self) -> Vec<EntryInfo> {
        let mut infos: Vec<EntryInfo> = self
            .entries
            .iter()
            .map(|(key, entry)| EntryInfo {
                key: key.clone(),
                size: entry.size(),
                content_type: entry.content_type().to_string(),
                expires_at: entry.expires_at(),
            })
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.entries.len(), self.resident_bytes)
    }

    /// Current sum of resident body sizes.
    pub fn resident_bytes(&self) -> u64 {
        self.resident_bytes
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    // == Length ==
    /// Returns the current number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
