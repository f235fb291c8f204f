//! API Module
//!
//! Optional admin HTTP API over the cache, enabled by `port_admin`.
//!
//! # Endpoints
//! - `GET /entries` - List resident entries
//! - `DELETE /entries` - Clear the cache
//! - `POST /entries/remove` - Remove entries by key or glob
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
