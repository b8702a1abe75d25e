use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("admin token is not configured on the server")]
    NotConfigured,
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid bearer token")]
    InvalidToken,
}

/// Static bearer-token check for administrative endpoints
pub struct AdminAuth {
    token: Option<String>,
}

impl AdminAuth {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    /// Server misconfiguration is reported ahead of any caller error
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let expected = self.token.as_deref().ok_or(AuthError::NotConfigured)?;

        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(())
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(auth: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(auth));
        headers
    }

    #[test]
    fn test_authorize() {
        let auth = AdminAuth::new(Some("s3cret".to_string()));

        assert_eq!(auth.authorize(&headers_with("Bearer s3cret")), Ok(()));
        assert_eq!(
            auth.authorize(&headers_with("Bearer wrong")),
            Err(AuthError::InvalidToken)
        );
        assert_eq!(
            auth.authorize(&headers_with("Basic s3cret")),
            Err(AuthError::MissingToken)
        );
        assert_eq!(auth.authorize(&HeaderMap::new()), Err(AuthError::MissingToken));
    }

    #[test]
    fn test_unconfigured_token_wins() {
        let auth = AdminAuth::new(None);
        assert_eq!(
            auth.authorize(&headers_with("Bearer anything")),
            Err(AuthError::NotConfigured)
        );
        assert_eq!(auth.authorize(&HeaderMap::new()), Err(AuthError::NotConfigured));
    }
}
