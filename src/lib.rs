//! Mini Proxy - A single-target caching HTTP forward proxy
//!
//! Serves GET requests from an in-memory cache bounded by TTL, entry count
//! and total bytes, fetching misses from one fixed upstream host.

pub mod api;
pub mod cache;
pub mod config;
pub mod console;
pub mod error;
pub mod models;
pub mod proxy;
pub mod tasks;

pub use api::AppState;
pub use cache::Cache;
pub use config::Config;
pub use console::Console;
pub use proxy::{ProxyHandle, ProxyServer};
