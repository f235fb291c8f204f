//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the proxy.
//!
//! # Tasks
//! - Expiry sweep: evicts stale cache entries at a fixed interval

mod sweep;

pub use sweep::{spawn_sweep_task, SweepHandle, SHUTDOWN_GRACE};
