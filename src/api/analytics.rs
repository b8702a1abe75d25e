//! Analytics API handlers
//!
//! `POST /api/analytics` is open to any banner and folds one event into the
//! domain's bucket for the current UTC day. `GET /api/analytics` returns the
//! aggregated report and requires the admin bearer token.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::analytics::{AnalyticsEvent, AnalyticsReport, CategoryChoices, EventType};
use crate::validation::{parse_date, required, validate_domain, ValidationError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEventRequest {
    pub domain: String,
    pub event: String,
    #[serde(default)]
    pub categories: Option<Value>,
    /// Milliseconds from banner display to decision; non-numeric values are ignored
    #[serde(default)]
    pub time_to_decision: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub domain: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Record a banner analytics event
///
/// # Arguments
/// * `state` - Shared application state holding the aggregator
/// * `payload` - `{domain, event, categories?, timeToDecision?}`
///
/// # Returns
/// `{"success": true}`, or 400 for an unknown event, a bad domain or a
/// non-object `categories`. A non-numeric `timeToDecision` is dropped.
pub async fn record_event(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RecordEventRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Json(payload) = payload?;

    let domain = validate_domain(&payload.domain)?;
    let event = payload
        .event
        .parse::<EventType>()
        .map_err(|e| ValidationError::InvalidEvent(e.0))?;

    let categories = match payload.categories {
        None => None,
        Some(value) if value.is_object() => Some(CategoryChoices::from_json(&value)),
        Some(_) => {
            return Err(
                ValidationError::InvalidCategories("categories must be an object").into(),
            )
        }
    };

    state
        .analytics
        .record(&AnalyticsEvent {
            domain,
            event,
            categories,
            time_to_decision: payload.time_to_decision.as_ref().and_then(Value::as_f64),
        })
        .await?;

    Ok(Json(SuccessResponse { success: true }))
}

/// Aggregated report for a domain over `[from, to]` (admin only)
///
/// # Arguments
/// * `headers` - Must carry `Authorization: Bearer <ADMIN_TOKEN>`
/// * `query` - `domain`, `from` and `to` (dates as `YYYY-MM-DD`)
///
/// # Returns
/// The report JSON. Authorization is checked before any parameter.
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ReportQuery>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    state.admin.authorize(&headers)?;

    let domain = validate_domain(required(query.domain.as_deref(), "domain")?)?;
    let from = parse_date(required(query.from.as_deref(), "from")?, "from")?;
    let to = parse_date(required(query.to.as_deref(), "to")?, "to")?;

    let report = state.analytics.report(&domain, from, to).await?;
    Ok(Json(report))
}
