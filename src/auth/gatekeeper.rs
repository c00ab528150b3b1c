//! The gatekeeper: ordered middleware stages that turn credentials into a
//! request identity.
//!
//! Neither stage ever rejects a request. A credential that fails is logged
//! and the request continues anonymous; whether anonymous is acceptable is
//! decided by the route, through [`CurrentUser`](super::CurrentUser). The
//! only marks a stage leaves are the identity extension and, from the
//! cookie stage, Set-Cookie headers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};

use super::errors::AuthFailure;
use super::extract::{RequestCredentials, bearer_token};
use super::identity::{RequestIdentity, resolve_identity};
use super::refresh::{RefreshCoordinator, RefreshOutcome};
use crate::db::Database;
use crate::jwt::{KeyDomain, TokenCodec};

/// Shared state for both gatekeeper stages.
#[derive(Clone)]
pub struct GatekeeperState {
    pub codec: Arc<TokenCodec>,
    pub db: Database,
    pub coordinator: Arc<RefreshCoordinator>,
    pub store_timeout: Duration,
}

/// Stage one: cookie credentials. A live access cookie authenticates the
/// request outright; otherwise the refresh cookie gets one shot at minting
/// a new pair. Runs before the bearer stage, so cookie identity wins when
/// both kinds of credential are present.
pub async fn cookie_gatekeeper(
    State(state): State<GatekeeperState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<RequestIdentity>().is_some() {
        return next.run(request).await;
    }

    let credentials = RequestCredentials::from_cookies(request.headers());

    if let Some(access) = credentials.access.as_deref() {
        match authenticate_access(&state, access).await {
            Ok(identity) => {
                request.extensions_mut().insert(identity);
                return next.run(request).await;
            }
            Err(failure) => failure.log("cookie stage"),
        }
    }

    match state.coordinator.refresh(credentials.refresh.as_deref()).await {
        RefreshOutcome::Reissued {
            identity,
            access_cookie,
            refresh_cookie,
        } => {
            request.extensions_mut().insert(identity);
            let response = next.run(request).await;
            with_cookies(response, &[access_cookie, refresh_cookie])
        }
        RefreshOutcome::Rejected {
            access_cookie,
            refresh_cookie,
        } => {
            let response = next.run(request).await;
            with_cookies(response, &[access_cookie, refresh_cookie])
        }
        RefreshOutcome::Missing | RefreshOutcome::Failed => next.run(request).await,
    }
}

/// Stage two: `Authorization: Bearer` access tokens, for callers that keep
/// tokens out of cookies. Skipped once an earlier stage has attached an
/// identity.
pub async fn bearer_gatekeeper(
    State(state): State<GatekeeperState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<RequestIdentity>().is_some() {
        return next.run(request).await;
    }

    let token = bearer_token(request.headers()).map(str::to_string);
    if let Some(token) = token {
        match authenticate_access(&state, &token).await {
            Ok(identity) => {
                request.extensions_mut().insert(identity);
            }
            Err(failure) => failure.log("bearer stage"),
        }
    }

    next.run(request).await
}

/// Verify an access token and resolve its subject, under the store
/// deadline.
async fn authenticate_access(
    state: &GatekeeperState,
    token: &str,
) -> Result<RequestIdentity, AuthFailure> {
    let claims = state.codec.verify(KeyDomain::Access, token)?;

    let resolve = resolve_identity(&state.db, &claims.sub);
    match tokio::time::timeout(state.store_timeout, resolve).await {
        Ok(result) => result,
        Err(_) => Err(AuthFailure::store_timeout()),
    }
}

/// Add Set-Cookie values ahead of any the handler already wrote. Browsers
/// honor the last Set-Cookie for a name, so the handler's own writes stay
/// decisive.
fn with_cookies(mut response: Response, cookies: &[String]) -> Response {
    let headers = response.headers_mut();
    let existing: Vec<HeaderValue> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .cloned()
        .collect();
    headers.remove(header::SET_COOKIE);

    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            headers.append(header::SET_COOKIE, value);
        }
    }
    for value in existing {
        headers.append(header::SET_COOKIE, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_cookies_puts_handler_cookies_last() {
        let mut response = Response::new(axum::body::Body::empty());
        response.headers_mut().append(
            header::SET_COOKIE,
            HeaderValue::from_static("REFRESH_TOKEN=; Max-Age=0"),
        );

        let response = with_cookies(
            response,
            &[
                "ACCESS_TOKEN=fresh".to_string(),
                "REFRESH_TOKEN=fresh".to_string(),
            ],
        );

        let values: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(
            values,
            vec![
                "ACCESS_TOKEN=fresh",
                "REFRESH_TOKEN=fresh",
                "REFRESH_TOKEN=; Max-Age=0",
            ]
        );
    }

    #[test]
    fn test_with_cookies_on_clean_response() {
        let response = with_cookies(
            Response::new(axum::body::Body::empty()),
            &["ACCESS_TOKEN=fresh".to_string()],
        );

        let values: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(values, vec!["ACCESS_TOKEN=fresh"]);
    }
}
