//! Rate limiting on the consent endpoints, end to end through the router

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use std::sync::Arc;

fn save_body() -> serde_json::Value {
    json!({
        "domain": "example.com",
        "consentId": "visitor-0001",
        "categories": {"analytics": true, "marketing": false}
    })
}

#[tokio::test]
async fn test_headers_track_remaining_requests() {
    let app = test_app(3, 60);

    for expected_remaining in ["2", "1", "0"] {
        let response = app
            .send(json_request("POST", "/api/consent", "203.0.113.5", save_body()))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "x-ratelimit-limit"), Some("3"));
        assert_eq!(
            header_str(&response, "x-ratelimit-remaining"),
            Some(expected_remaining)
        );
        let reset = (NOON + 60).to_string();
        assert_eq!(header_str(&response, "x-ratelimit-reset"), Some(reset.as_str()));
    }
}

#[tokio::test]
async fn test_denied_request_gets_429_with_retry_after() {
    let app = test_app(2, 60);

    for _ in 0..2 {
        let response = app
            .send(get_request(
                "/api/consent?domain=example.com&consentId=visitor-0001",
                "203.0.113.5",
            ))
            .await;
        // Nothing stored yet, but the request was admitted
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    app.clock.advance(15);
    let response = app
        .send(get_request(
            "/api/consent?domain=example.com&consentId=visitor-0001",
            "203.0.113.5",
        ))
        .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header_str(&response, "retry-after"), Some("45"));
    assert_eq!(header_str(&response, "x-ratelimit-remaining"), Some("0"));

    let json = body_json(response).await;
    assert_eq!(json, json!({"error": "rate_limit_exceeded", "retryAfter": 45}));
}

#[tokio::test]
async fn test_denials_do_not_extend_window() {
    let app = test_app(1, 60);

    let response = app
        .send(json_request("POST", "/api/consent", "198.51.100.9", save_body()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    for _ in 0..5 {
        app.clock.advance(10);
        let response = app
            .send(json_request("POST", "/api/consent", "198.51.100.9", save_body()))
            .await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let reset = (NOON + 60).to_string();
        assert_eq!(header_str(&response, "x-ratelimit-reset"), Some(reset.as_str()));
    }

    app.clock.advance(10);
    let response = app
        .send(json_request("POST", "/api/consent", "198.51.100.9", save_body()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-ratelimit-remaining"), Some("0"));
}

#[tokio::test]
async fn test_callers_are_isolated() {
    let app = test_app(1, 60);

    let first = app
        .send(json_request("POST", "/api/consent", "203.0.113.1", save_body()))
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let blocked = app
        .send(json_request("POST", "/api/consent", "203.0.113.1", save_body()))
        .await;
    assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);

    let other = app
        .send(json_request("POST", "/api/consent", "203.0.113.2", save_body()))
        .await;
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_store_failure_fails_open_without_headers() {
    let app = test_app_with(Arc::new(FailingStore), test_config(1, 60));

    for _ in 0..3 {
        let response = app
            .send(get_request(
                "/api/consent?domain=example.com&consentId=visitor-0001",
                "203.0.113.5",
            ))
            .await;
        // The handler itself still reports the broken store
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(header_str(&response, "x-ratelimit-limit").is_none());
        assert!(header_str(&response, "x-ratelimit-remaining").is_none());
        assert!(header_str(&response, "x-ratelimit-reset").is_none());
    }
}

#[tokio::test]
async fn test_corrupted_window_starts_fresh() {
    let app = test_app(10, 60);
    app.store
        .put("rl:203.0.113.5", br#"{"count": -3, "resetAt": 99999999999}"#.to_vec(), 60)
        .await
        .unwrap();

    let response = app
        .send(json_request("POST", "/api/consent", "203.0.113.5", save_body()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-ratelimit-remaining"), Some("9"));
}

#[tokio::test]
async fn test_callers_without_address_share_sentinel_bucket() {
    let app = test_app(1, 60);

    let request = || {
        axum::http::Request::builder()
            .uri("/api/consent?domain=example.com&consentId=visitor-0001")
            .body(axum::body::Body::empty())
            .unwrap()
    };

    assert_eq!(app.send(request()).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        app.send(request()).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert!(app.store.get("rl:unknown").await.unwrap().is_some());
}

#[tokio::test]
async fn test_analytics_and_geo_are_not_rate_limited() {
    let app = test_app(1, 60);

    for _ in 0..3 {
        let response = app.send(get_request("/api/geo", "203.0.113.5")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(header_str(&response, "x-ratelimit-limit").is_none());

        let response = app
            .send(json_request(
                "POST",
                "/api/analytics",
                "203.0.113.5",
                json!({"domain": "example.com", "event": "banner_shown"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
