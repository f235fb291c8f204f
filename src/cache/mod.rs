//! Cache Module
//!
//! Provides the bounded in-memory response cache with TTL expiry,
//! entry/byte caps and a periodic background sweep.

mod entry;
mod handle;
mod pattern;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use handle::Cache;
pub use pattern::KeyPattern;
pub use stats::{CacheStats, StatsSnapshot};
pub use store::{CacheStore, EntryInfo};
