//! Integration Tests for Admin API Endpoints
//!
//! Tests the full request/response cycle for each endpoint.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bytes::Bytes;
use mini_proxy::{api::create_router, cache::CacheStore, AppState, Cache};
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_cache() -> Cache {
    Cache::with_store(
        CacheStore::new(100, 1 << 20, Duration::from_secs(300)),
        Duration::from_secs(600),
    )
}

fn create_test_app(cache: Cache) -> Router {
    create_router(AppState::new(cache))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn seed(cache: &Cache) {
    cache
        .add("http://h:8080/a.png", Bytes::from_static(b"png-a"), "image/png")
        .await;
    cache
        .add("http://h:8080/b.png", Bytes::from_static(b"png-bb"), "image/png")
        .await;
    cache
        .add("http://h:8080/site.css", Bytes::from_static(b"body{}"), "text/css")
        .await;
}

fn remove_request(body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/entries/remove")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

// == Entries Endpoint Tests ==

#[tokio::test]
async fn test_entries_endpoint_lists_sorted() {
    let cache = create_test_cache();
    seed(&cache).await;
    let app = create_test_app(cache);

    let response = app
        .oneshot(Request::builder().uri("/entries").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["key"], "http://h:8080/a.png");
    assert_eq!(entries[0]["size"], 5);
    assert_eq!(entries[0]["content_type"], "image/png");
    assert_eq!(entries[2]["key"], "http://h:8080/site.css");
    assert_eq!(json["resident_bytes"], 17);
}

#[tokio::test]
async fn test_entries_endpoint_empty_cache() {
    let app = create_test_app(create_test_cache());

    let response = app
        .oneshot(Request::builder().uri("/entries").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert!(json["entries"].as_array().unwrap().is_empty());
    assert_eq!(json["resident_bytes"], 0);
}

#[tokio::test]
async fn test_clear_endpoint() {
    let cache = create_test_cache();
    seed(&cache).await;
    let app = create_test_app(cache.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/entries")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["cleared"], 3);
    assert!(cache.entries().await.is_empty());
}

// == Remove Endpoint Tests ==

#[tokio::test]
async fn test_remove_endpoint_glob() {
    let cache = create_test_cache();
    seed(&cache).await;
    let app = create_test_app(cache.clone());

    let response = app
        .oneshot(remove_request(r#"{"pattern":"*.png"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["pattern"], "*.png");
    assert_eq!(json["removed"], 2);

    let remaining = cache.entries().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].key, "http://h:8080/site.css");
}

#[tokio::test]
async fn test_remove_endpoint_exact_key() {
    let cache = create_test_cache();
    seed(&cache).await;
    let app = create_test_app(cache.clone());

    let response = app
        .oneshot(remove_request(r#"{"pattern":"http://h:8080/b.png"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 1);
    assert_eq!(cache.entries().await.len(), 2);
}

#[tokio::test]
async fn test_remove_endpoint_no_match() {
    let cache = create_test_cache();
    seed(&cache).await;
    let app = create_test_app(cache.clone());

    let response = app
        .oneshot(remove_request(r#"{"pattern":"*.js"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 0);
    assert_eq!(cache.entries().await.len(), 3);
}

#[tokio::test]
async fn test_remove_endpoint_empty_pattern() {
    let app = create_test_app(create_test_cache());

    let response = app
        .oneshot(remove_request(r#"{"pattern":"  "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_to_json(response.into_body()).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_remove_endpoint_invalid_json() {
    let app = create_test_app(create_test_cache());

    let response = app
        .oneshot(remove_request(r#"{"not_pattern":1}"#))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

// == Stats Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let cache = create_test_cache();
    seed(&cache).await;
    assert!(cache.get("http://h:8080/a.png").await.is_some());
    assert!(cache.get("http://h:8080/missing").await.is_none());
    assert!(
        !cache
            .add("http://h:8080/a.png", Bytes::from_static(b"again"), "image/png")
            .await
    );
    let app = create_test_app(cache);

    let response = app
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["rejected"], 1);
    assert_eq!(json["total_entries"], 3);
    assert_eq!(json["resident_bytes"], 17);
    assert_eq!(json["hit_rate"], 0.5);
}

// == Health Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(create_test_cache());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

#[tokio::test]
async fn test_unknown_route_not_found() {
    let app = create_test_app(create_test_cache());

    let response = app
        .oneshot(Request::builder().uri("/keys").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
