use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::analytics::{get_report, record_event};
use super::geo::geo_lookup;
use super::handlers::{delete_consent, get_consent, health_check, save_consent};
use super::middleware::{rate_limit, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET};
use super::AppState;
use crate::config::CorsConfig;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors);

    let consent_routes = Router::new()
        .route(
            "/api/consent",
            get(get_consent).post(save_consent).delete(delete_consent),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            rate_limit,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/geo", get(geo_lookup))
        .route("/api/analytics", get(get_report).post(record_event))
        .merge(consent_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([
            X_RATELIMIT_LIMIT,
            X_RATELIMIT_REMAINING,
            X_RATELIMIT_RESET,
            header::RETRY_AFTER,
        ])
}
