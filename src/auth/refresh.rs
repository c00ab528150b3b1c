//! Mid-request session refresh.
//!
//! When a request has no usable access token, the cookie stage hands its
//! refresh cookie here. Every path out is one of the four
//! [`RefreshOutcome`]s; a failed refresh never turns into an error
//! response on its own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use super::cookie::{ACCESS_COOKIE_NAME, CookieSettings, REFRESH_COOKIE_NAME};
use super::errors::AuthFailure;
use super::identity::{RequestIdentity, resolve_identity};
use super::issuer::TokenIssuer;
use crate::db::Database;
use crate::jwt::{KeyDomain, TokenCodec};

/// What became of one refresh attempt.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// A new pair was issued. Attach the identity, set both cookies.
    Reissued {
        identity: RequestIdentity,
        access_cookie: String,
        refresh_cookie: String,
    },
    /// No refresh token was presented.
    Missing,
    /// The token did not hold up. Both cookies carry clears.
    Rejected {
        access_cookie: String,
        refresh_cookie: String,
    },
    /// The store could not answer, or reissue fell over after the token
    /// validated. Cookies stay untouched; a later request may succeed.
    Failed,
}

/// Drives the refresh flow for the cookie stage.
pub struct RefreshCoordinator {
    codec: Arc<TokenCodec>,
    db: Database,
    issuer: TokenIssuer,
    cookies: CookieSettings,
    store_timeout: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        codec: Arc<TokenCodec>,
        db: Database,
        issuer: TokenIssuer,
        cookies: CookieSettings,
        store_timeout: Duration,
    ) -> Self {
        Self {
            codec,
            db,
            issuer,
            cookies,
            store_timeout,
        }
    }

    /// Try to turn a refresh cookie into a fresh session.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> RefreshOutcome {
        let Some(token) = refresh_token else {
            return RefreshOutcome::Missing;
        };

        match self.try_reissue(token).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                failure.log("refresh");
                match failure {
                    AuthFailure::StoreUnavailable(_) => RefreshOutcome::Failed,
                    _ => RefreshOutcome::Rejected {
                        access_cookie: self.cookies.clear(ACCESS_COOKIE_NAME),
                        refresh_cookie: self.cookies.clear(REFRESH_COOKIE_NAME),
                    },
                }
            }
        }
    }

    /// Verify, check currency, resolve, reissue. Validation failures come
    /// back as `Err`; a reissue that falls over after the token has already
    /// validated is `Ok(Failed)`, since the credential itself was fine.
    async fn try_reissue(&self, token: &str) -> Result<RefreshOutcome, AuthFailure> {
        let claims = self.codec.verify(KeyDomain::Refresh, token)?;

        let current = self
            .bounded(self.db.refresh_tokens().is_current(&claims.sub, token))
            .await?;
        if !current {
            return Err(AuthFailure::RefreshNotCurrent);
        }

        let identity = self.bounded(resolve_identity(&self.db, &claims.sub)).await?;

        let reissue = self.issuer.issue_group(&claims.sub, claims.provider);
        let group = match timeout(self.store_timeout, reissue).await {
            Ok(Ok(group)) => group,
            Ok(Err(e)) => {
                tracing::error!("token reissue failed after refresh validation: {}", e);
                return Ok(RefreshOutcome::Failed);
            }
            Err(_) => {
                tracing::error!("token reissue timed out after refresh validation");
                return Ok(RefreshOutcome::Failed);
            }
        };

        let ttl = self.issuer.ttl();
        Ok(RefreshOutcome::Reissued {
            identity,
            access_cookie: self.cookies.build(
                ACCESS_COOKIE_NAME,
                &group.access.token,
                ttl.access.as_secs(),
            ),
            refresh_cookie: self.cookies.build(
                REFRESH_COOKIE_NAME,
                &group.refresh.token,
                ttl.refresh.as_secs(),
            ),
        })
    }

    /// Run a store call under the configured deadline.
    async fn bounded<T, E>(
        &self,
        call: impl Future<Output = Result<T, E>>,
    ) -> Result<T, AuthFailure>
    where
        AuthFailure: From<E>,
    {
        match timeout(self.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(AuthFailure::from(e)),
            Err(_) => Err(AuthFailure::store_timeout()),
        }
    }
}
