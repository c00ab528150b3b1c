//! Request identity: the resolved principal a gatekeeper stage attaches to
//! a request, and the extractors handlers use to read it back.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::AuthFailure;
use crate::api::error::ApiError;
use crate::db::{Database, Principal};

/// Authority granted to a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Authority {
    User,
}

/// The identity attached to a request once a credential checks out.
/// Carried as a request extension; there is no ambient security context.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub principal: Principal,
    pub authorities: Vec<Authority>,
}

impl RequestIdentity {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            authorities: vec![Authority::User],
        }
    }
}

/// Resolve a verified subject claim to a full identity.
pub async fn resolve_identity(
    db: &Database,
    subject: &str,
) -> Result<RequestIdentity, AuthFailure> {
    match db.principals().find_by_id(subject).await? {
        Some(principal) => Ok(RequestIdentity::new(principal)),
        None => Err(AuthFailure::PrincipalNotFound),
    }
}

/// Extractor for endpoints that require an authenticated caller.
/// The 401 for anonymous requests comes from here, not from the pipeline.
pub struct CurrentUser(pub RequestIdentity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestIdentity>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
    }
}

/// Optional identity extractor - never fails.
/// For endpoints that serve both authenticated and anonymous callers.
pub struct MaybeUser(pub Option<RequestIdentity>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<RequestIdentity>().cloned()))
    }
}
