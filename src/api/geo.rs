//! Geo passthrough: the edge proxy has already resolved the visitor's country

use axum::{http::HeaderMap, Json};
use serde::Serialize;

/// EU and EEA members, plus GB and CH which carry equivalent regimes
const GDPR_COUNTRIES: &[&str] = &[
    "AT", "BE", "BG", "CY", "CZ", "DE", "DK", "EE", "ES", "FI", "FR", "GR", "HR", "HU", "IE",
    "IT", "LT", "LU", "LV", "MT", "NL", "PL", "PT", "RO", "SE", "SI", "SK", "IS", "LI", "NO",
    "GB", "CH",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoResponse {
    pub country: Option<String>,
    #[serde(rename = "isEU")]
    pub is_eu: bool,
}

pub fn requires_consent(country: &str) -> bool {
    GDPR_COUNTRIES.contains(&country)
}

/// Country from CF-IPCountry; `XX` and missing values are unknown
pub async fn geo_lookup(headers: HeaderMap) -> Json<GeoResponse> {
    let country = headers
        .get("cf-ipcountry")
        .and_then(|h| h.to_str().ok())
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| c.len() == 2 && c != "XX");

    let is_eu = country.as_deref().is_some_and(requires_consent);

    Json(GeoResponse { country, is_eu })
}
