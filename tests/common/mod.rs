//! Shared helpers for the integration tests
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use consentd::api::{create_router, AppState};
use consentd::clock::{Clock, MockClock};
use consentd::config::*;
use consentd::storage::{KvStore, MemoryStore};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub use consentd::storage::test_support::FailingStore;

/// 2024-05-14T12:00:00Z
pub const NOON: i64 = 1_715_688_000;
pub const ADMIN_TOKEN: &str = "test-admin-token";

pub fn test_config(max_requests: u32, window_secs: u64) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8787,
        },
        store: StoreConfig {
            backend: StoreBackend::Memory,
            url: String::new(),
            max_connections: 1,
        },
        rate_limit: RateLimitConfig {
            max_requests,
            window_secs,
        },
        admin: AdminConfig {
            token: Some(ADMIN_TOKEN.to_string()),
        },
        cors: CorsConfig::default(),
        proxy: ProxyConfig::default(),
        consent: ConsentConfig::default(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<MockClock>,
    pub store: Arc<dyn KvStore>,
}

pub fn test_app_with(store: Arc<dyn KvStore>, config: Config) -> TestApp {
    let clock = Arc::new(MockClock::new(NOON));
    let state = Arc::new(AppState::new(
        Arc::clone(&store),
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(config),
    ));
    TestApp {
        router: create_router(state),
        clock,
        store,
    }
}

pub fn test_app(max_requests: u32, window_secs: u64) -> TestApp {
    test_app_with(
        Arc::new(MemoryStore::default()),
        test_config(max_requests, window_secs),
    )
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn json_request(method: &str, uri: &str, ip: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("cf-connecting-ip", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("cf-connecting-ip", ip)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn header_str<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}
