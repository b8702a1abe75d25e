//! Rate-limit middleware for the consent routes
//!
//! Admitted responses carry `X-RateLimit-Limit`, `X-RateLimit-Remaining`
//! and `X-RateLimit-Reset`. Refused requests get 429 with `Retry-After`.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

use super::identity::caller_identity;
use super::AppState;
use crate::rate_limit::RateLimitDecision;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitedResponse {
    error: &'static str,
    retry_after: i64,
}

/// Admission control for the consent endpoints.
///
/// A store failure skips the check entirely: the request proceeds and no
/// rate-limit headers are attached.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let socket_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let identity = caller_identity(request.headers(), socket_ip, &state.config.proxy);

    let decision = match state
        .rate_limiter
        .check(&identity, &state.config.rate_limit)
        .await
    {
        Ok(decision) => decision,
        Err(e) => {
            warn!(identity = %identity, error = %e, "rate limit check unavailable, failing open");
            return next.run(request).await;
        }
    };

    if !decision.allowed {
        let retry_after = decision.retry_after(state.rate_limiter.now());
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RateLimitedResponse {
                error: "rate_limit_exceeded",
                retry_after,
            }),
        )
            .into_response();
        let headers = response.headers_mut();
        headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        apply_rate_limit_headers(headers, &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at));
}
