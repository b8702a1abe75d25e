//! Consent record and health handlers
//!
//! Consent endpoints sit behind the rate-limit middleware. Records are keyed
//! by domain and consent ID; a save overwrites the previous record and
//! restarts its expiry.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::consent::{ConsentCategories, ConsentRecord, ConsentStore};
use crate::validation::{normalize_version, required, validate_consent_id, validate_domain};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConsentRequest {
    pub domain: String,
    #[serde(default)]
    pub consent_id: Option<String>,
    #[serde(default)]
    pub categories: Value,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentQuery {
    pub domain: Option<String>,
    pub consent_id: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConsentResponse {
    pub success: bool,
    pub consent_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentResponse {
    #[serde(flatten)]
    pub record: ConsentRecord,
    pub version_mismatch: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteConsentResponse {
    pub success: bool,
    pub deleted: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Store a visitor's consent choices
pub async fn save_consent(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SaveConsentRequest>, JsonRejection>,
) -> Result<Json<SaveConsentResponse>, ApiError> {
    let Json(payload) = payload?;

    let domain = validate_domain(&payload.domain)?;
    let consent_id = match payload.consent_id.as_deref() {
        Some(id) => validate_consent_id(id)?.to_string(),
        None => ConsentStore::generate_id(),
    };
    let categories = ConsentCategories::from_json(&payload.categories)?;
    let version = normalize_version(payload.version.as_deref())?;

    let record = state
        .consents
        .save(&domain, &consent_id, categories, version)
        .await?;

    Ok(Json(SaveConsentResponse {
        success: true,
        consent_id: record.consent_id,
    }))
}

/// Fetch stored consent, flagging records saved under a different banner version
///
/// # Arguments
/// * `query` - `domain`, `consentId` and an optional banner `version`
///
/// # Returns
/// The stored record plus `versionMismatch`, or 404 when nothing is stored.
/// An empty `version` counts as not provided.
pub async fn get_consent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConsentQuery>,
) -> Result<Json<ConsentResponse>, ApiError> {
    let domain = validate_domain(required(query.domain.as_deref(), "domain")?)?;
    let consent_id = validate_consent_id(required(query.consent_id.as_deref(), "consentId")?)?;
    let expected_version = normalize_version(query.version.as_deref())?;

    let record = state
        .consents
        .get(&domain, consent_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let version_mismatch = expected_version
        .as_deref()
        .is_some_and(|expected| record.version.as_deref() != Some(expected));

    Ok(Json(ConsentResponse {
        record,
        version_mismatch,
    }))
}

/// Erase a visitor's consent record
pub async fn delete_consent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConsentQuery>,
) -> Result<Json<DeleteConsentResponse>, ApiError> {
    let domain = validate_domain(required(query.domain.as_deref(), "domain")?)?;
    let consent_id = validate_consent_id(required(query.consent_id.as_deref(), "consentId")?)?;

    let deleted = state.consents.delete(&domain, consent_id).await?;

    Ok(Json(DeleteConsentResponse {
        success: true,
        deleted,
    }))
}
