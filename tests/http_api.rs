//! HTTP API tests driving the router in-process.

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{Script, ScriptedBackend};
use rephrase::{Config, RephraseServer};
use serde_json::{json, Value};
use tower::ServiceExt;

fn router(scripts: Vec<Script>) -> Router {
    let backend = Arc::new(ScriptedBackend::new(scripts));
    RephraseServer::with_backend(Config::default(), backend).router()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn create(router: &Router, text: &str, styles: &[&str]) -> String {
    let (status, body) = send(
        router,
        post_json("/v1/rephrase", &json!({"text": text, "styles": styles})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let value: Value = serde_json::from_str(&body).unwrap();
    value["request_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_root_and_health() {
    let router = router(vec![]);

    let (status, body) = send(&router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"message": "AI Writing Assistant Backend"})
    );

    let (status, body) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["version"], rephrase::VERSION);
}

#[tokio::test]
async fn test_create_returns_request_id() {
    let router = router(vec![]);

    let first = create(&router, "Hello", &["formal", "casual"]).await;
    let second = create(&router, "Hello", &["formal", "casual"]).await;
    assert_ne!(first, second);

    let (_, body) = send(&router, get("/stats")).await;
    let stats: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["requests_created"], 2);
    assert_eq!(stats["active_jobs"], 2);
}

#[tokio::test]
async fn test_create_rejects_malformed_body() {
    let router = router(vec![]);

    let (status, _) = send(&router, post_json("/v1/rephrase", &json!({"text": "Hello"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &router,
        post_json("/v1/rephrase", &json!({"text": "Hello", "styles": "casual"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_stream_requires_request_id() {
    let router = router(vec![]);

    for uri in ["/v1/rephrase/stream", "/v1/rephrase/stream?request_id="] {
        let (status, body) = send(&router, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({"detail": "request_id is required"})
        );
    }
}

#[tokio::test]
async fn test_stream_events() {
    let router = router(vec![Script::deltas(&["Hi", " there"])]);
    let id = create(&router, "Hello", &["casual"]).await;

    let response = router
        .clone()
        .oneshot(get(&format!("/v1/rephrase/stream?request_id={id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(
        String::from_utf8(body.to_vec()).unwrap(),
        concat!(
            "data: {\"type\":\"delta\",\"style\":\"casual\",\"text\":\"Hi\"}\n\n",
            "data: {\"type\":\"delta\",\"style\":\"casual\",\"text\":\" there\"}\n\n",
            "data: {\"type\":\"complete\",\"style\":\"casual\"}\n\n",
            "data: {\"type\":\"end\"}\n\n",
        )
    );

    // Job is gone once the stream ends
    let (status, _) = send(&router, delete(&format!("/v1/rephrase/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stream_unknown_request() {
    let router = router(vec![]);

    let (status, body) = send(&router, get("/v1/rephrase/stream?request_id=missing")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        "data: {\"type\":\"error\",\"message\":\"Request not found\"}\n\n"
    );
}

#[tokio::test]
async fn test_cancel_request() {
    let router = router(vec![]);
    let id = create(&router, "Hello", &["casual"]).await;

    // Nothing is streaming yet, so there is no upstream handle to close
    let (status, body) = send(&router, delete(&format!("/v1/rephrase/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"detail": "Request not found or already completed"})
    );

    let (_, body) = send(&router, get("/stats")).await;
    let stats: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["active_jobs"], 0);
    assert_eq!(stats["cancellations"], 1);
}

#[tokio::test]
async fn test_cancel_streaming_request() {
    let backend = Arc::new(ScriptedBackend::new(vec![Script::held(&["Hi"])]));
    let server = RephraseServer::with_backend(Config::default(), backend.clone());
    let router = server.router();
    let id = create(&router, "Hello", &["casual"]).await;

    // Open the stream and pull the first event so the upstream handle is registered
    let service = server.state().service.clone();
    let mut events = Box::pin(service.stream_rephrase(server.state().stream_token(), &id));
    futures::StreamExt::next(&mut events).await.unwrap();

    let (status, body) = send(&router, delete(&format!("/v1/rephrase/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"message": format!("Request {id} canceled successfully")})
    );
    assert_eq!(backend.closes(), 1);
}

#[tokio::test]
async fn test_shutdown_ends_open_streams() {
    let backend = Arc::new(ScriptedBackend::new(vec![Script::held(&["Hi"])]));
    let server = RephraseServer::with_backend(Config::default(), backend.clone());
    let router = server.router();
    let id = create(&router, "Hello", &["casual"]).await;

    let response = router
        .clone()
        .oneshot(get(&format!("/v1/rephrase/stream?request_id={id}")))
        .await
        .unwrap();

    server.shutdown();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.is_empty());
    assert_eq!(backend.closes(), 1);
    assert_eq!(server.state().service.active_requests(), 0);
}
