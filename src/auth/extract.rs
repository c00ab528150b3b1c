//! Credential extraction from request headers.
//!
//! Extraction only reports what is present. A request without credentials
//! is ordinary; deciding what absence means is the gatekeeper's job.

use axum::http::{HeaderMap, header};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie};

/// Raw token material found on a request.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RequestCredentials {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

impl RequestCredentials {
    /// Read both token cookies. An empty value counts as absent.
    pub fn from_cookies(headers: &HeaderMap) -> Self {
        Self {
            access: get_cookie(headers, ACCESS_COOKIE_NAME)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            refresh: get_cookie(headers, REFRESH_COOKIE_NAME)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        }
    }
}

/// Read an access token from the Authorization header.
/// The "Bearer " scheme is matched case-sensitively; the token itself is
/// trimmed, and an empty remainder counts as absent.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}
