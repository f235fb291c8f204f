//! API Handlers
//!
//! HTTP request handlers for each admin endpoint. They expose the same
//! operations as the operator console.

use axum::{extract::State, Json};

use crate::cache::Cache;
use crate::error::{ProxyError, Result};
use crate::models::{
    ClearResponse, EntriesResponse, HealthResponse, RemoveRequest, RemoveResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the process-wide cache
    pub cache: Cache,
}

impl AppState {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }
}

/// Handler for GET /entries
///
/// Lists resident entries with their size, type and expiry.
pub async fn entries_handler(State(state): State<AppState>) -> Json<EntriesResponse> {
    Json(EntriesResponse::new(state.cache.entries().await))
}

/// Handler for DELETE /entries
///
/// Empties the cache.
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    Json(ClearResponse::new(state.cache.clear().await))
}

/// Handler for POST /entries/remove
///
/// Removes entries matching an exact key or glob pattern.
pub async fn remove_handler(
    State(state): State<AppState>,
    Json(req): Json<RemoveRequest>,
) -> Result<Json<RemoveResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ProxyError::InvalidRequest(error_msg));
    }

    let removed = state.cache.remove(&req.pattern).await?;
    Ok(Json(RemoveResponse::new(req.pattern, removed)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats().await))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use bytes::Bytes;
    use std::time::Duration;

    fn test_state() -> AppState {
        AppState::new(Cache::with_store(
            CacheStore::new(100, 1 << 20, Duration::from_secs(300)),
            Duration::from_secs(600),
        ))
    }

    #[tokio::test]
    async fn test_entries_and_clear_handlers() {
        let state = test_state();
        state
            .cache
            .add("http://h/a", Bytes::from_static(b"abc"), "text/plain")
            .await;

        let response = entries_handler(State(state.clone())).await;
        assert_eq!(response.entries.len(), 1);
        assert_eq!(response.resident_bytes, 3);

        let response = clear_handler(State(state.clone())).await;
        assert_eq!(response.cleared, 1);
        assert!(state.cache.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_handler() {
        let state = test_state();
        state
            .cache
            .add("http://h/a.png", Bytes::from_static(b"1"), "image/png")
            .await;
        state
            .cache
            .add("http://h/b.css", Bytes::from_static(b"2"), "text/css")
            .await;

        let req = RemoveRequest {
            pattern: "*.png".to_string(),
        };
        let response = remove_handler(State(state.clone()), Json(req)).await.unwrap();
        assert_eq!(response.removed, 1);
        assert_eq!(state.cache.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_handler_rejects_empty_pattern() {
        let state = test_state();
        let req = RemoveRequest {
            pattern: "".to_string(),
        };
        let result = remove_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(ProxyError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state();
        let _ = state.cache.get("missing").await;

        let response = stats_handler(State(state)).await;
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 1);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
