//! Input checks shared by the HTTP handlers

use chrono::NaiveDate;
use thiserror::Error;

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;
const MIN_CONSENT_ID_LEN: usize = 8;
const MAX_CONSENT_ID_LEN: usize = 64;
const MAX_VERSION_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("domain must be a valid hostname")]
    InvalidDomain,
    #[error("consentId must be 8-64 characters of [A-Za-z0-9_-]")]
    InvalidConsentId,
    #[error("version must be at most 32 characters")]
    InvalidVersion,
    #[error("{field} must be a date in YYYY-MM-DD form")]
    InvalidDate { field: &'static str },
    #[error("unknown event type '{0}'")]
    InvalidEvent(String),
    #[error("{0}")]
    InvalidCategories(&'static str),
    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),
}

impl ValidationError {
    /// Machine-readable tag for error bodies
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidDomain => "invalid_domain",
            ValidationError::InvalidConsentId => "invalid_consent_id",
            ValidationError::InvalidVersion => "invalid_version",
            ValidationError::InvalidDate { .. } => "invalid_date",
            ValidationError::InvalidEvent(_) => "invalid_event",
            ValidationError::InvalidCategories(_) => "invalid_categories",
            ValidationError::MissingParameter(_) => "missing_parameter",
        }
    }
}

/// Normalize and check a site hostname; returns the lowercase form
pub fn validate_domain(raw: &str) -> Result<String, ValidationError> {
    let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
        return Err(ValidationError::InvalidDomain);
    }

    let labels_ok = domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    });

    if labels_ok {
        Ok(domain)
    } else {
        Err(ValidationError::InvalidDomain)
    }
}

pub fn validate_consent_id(raw: &str) -> Result<&str, ValidationError> {
    let valid_len = (MIN_CONSENT_ID_LEN..=MAX_CONSENT_ID_LEN).contains(&raw.len());
    let valid_chars = raw
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid_len && valid_chars {
        Ok(raw)
    } else {
        Err(ValidationError::InvalidConsentId)
    }
}

/// An empty version reads as "not provided"
pub fn normalize_version(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.len() <= MAX_VERSION_LEN => Ok(Some(v.to_string())),
        Some(_) => Err(ValidationError::InvalidVersion),
    }
}

pub fn parse_date(raw: &str, field: &'static str) -> Result<NaiveDate, ValidationError> {
    // chrono accepts unpadded fields, the wire format does not
    if raw.len() != 10 {
        return Err(ValidationError::InvalidDate { field });
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate { field })
}

pub fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, ValidationError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingParameter(name))
}
