//! Session API endpoints.
//!
//! - GET `/me` - Describe the authenticated session
//! - POST `/validate` - Check a bearer access token without touching cookies
//! - POST `/logout` - Retire the stored refresh token and clear both cookies

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use serde::Serialize;
use tracing::warn;

use super::error::ApiError;
use crate::auth::{
    ACCESS_COOKIE_NAME, AuthFailure, Authority, CookieSettings, CurrentUser, MaybeUser,
    REFRESH_COOKIE_NAME, bearer_token,
};
use crate::db::{Database, Provider};
use crate::jwt::{KeyDomain, TokenCodec};

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub cookies: CookieSettings,
}

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/me", get(me))
        .route("/validate", post(validate))
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Serialize)]
struct SessionResponse {
    user_id: String,
    provider: Provider,
    authorities: Vec<Authority>,
}

/// Describe the session the gatekeeper attached to this request.
async fn me(CurrentUser(identity): CurrentUser) -> impl IntoResponse {
    Json(SessionResponse {
        user_id: identity.principal.id,
        provider: identity.principal.provider,
        authorities: identity.authorities,
    })
}

#[derive(Serialize)]
struct ValidateResponse {
    user_id: String,
    expires_at: u64,
}

/// Check a bearer access token. Returns 200 with the subject when the
/// token verifies, 401 otherwise. Cookies play no part here.
async fn validate(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let Some(token) = bearer_token(&headers) else {
        AuthFailure::CredentialMissing.log("validate");
        return Err(ApiError::unauthorized("No bearer token"));
    };

    let claims = state.codec.verify(KeyDomain::Access, token).map_err(|e| {
        AuthFailure::from(e).log("validate");
        ApiError::unauthorized("Invalid or expired token")
    })?;

    Ok(Json(ValidateResponse {
        user_id: claims.sub,
        expires_at: claims.exp,
    }))
}

/// Logout. Deletes the caller's stored refresh token when a session is
/// attached; clears both cookies either way. The cookie clears written
/// here outrank anything the cookie stage set earlier in the request.
async fn logout(State(state): State<AuthState>, MaybeUser(identity): MaybeUser) -> impl IntoResponse {
    if let Some(identity) = identity {
        if let Err(e) = state
            .db
            .refresh_tokens()
            .delete_by_user(&identity.principal.id)
            .await
        {
            warn!("Failed to delete refresh token on logout: {}", e);
        }
    }

    let clear_access = state.cookies.clear(ACCESS_COOKIE_NAME);
    let clear_refresh = state.cookies.clear(REFRESH_COOKIE_NAME);

    (
        StatusCode::NO_CONTENT,
        AppendHeaders([(SET_COOKIE, clear_access), (SET_COOKIE, clear_refresh)]),
    )
}
