use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::analytics::ReportError;
use crate::auth::AuthError;
use crate::storage::StoreError;
use crate::validation::ValidationError;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    InvalidBody(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{0}")]
    InvalidRange(String),
    #[error("{0}")]
    RangeTooLarge(String),
    #[error("consent record not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::InvalidRange { .. } => ApiError::InvalidRange(err.to_string()),
            ReportError::RangeTooLarge { .. } => ApiError::RangeTooLarge(err.to_string()),
            ReportError::Store(e) => ApiError::Store(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.code()),
            ApiError::InvalidBody(_) => (StatusCode::BAD_REQUEST, "invalid_body"),
            ApiError::Auth(AuthError::NotConfigured) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server_misconfigured")
            }
            ApiError::Auth(AuthError::MissingToken) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Auth(AuthError::InvalidToken) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::InvalidRange(_) => (StatusCode::BAD_REQUEST, "invalid_range"),
            ApiError::RangeTooLarge(_) => (StatusCode::BAD_REQUEST, "range_too_large"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            ApiError::Store(e) => {
                tracing::error!("Store operation failed: {}", e);
                "internal storage error".to_string()
            }
            ApiError::Auth(AuthError::NotConfigured) => {
                tracing::error!("Analytics report requested but ADMIN_TOKEN is not configured");
                self.to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                error: code,
                message,
            }),
        )
            .into_response()
    }
}
