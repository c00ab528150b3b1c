mod auth;
pub mod error;

use std::sync::Arc;

use axum::Router;

use crate::auth::{CookieSettings, TokenIssuer};
use crate::db::Database;
use crate::jwt::TokenCodec;

pub use error::ApiError;

/// Create the API router.
#[cfg_attr(not(feature = "test-mode"), allow(unused_variables))]
pub fn create_api_router(
    db: Database,
    codec: Arc<TokenCodec>,
    issuer: TokenIssuer,
    cookies: CookieSettings,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        codec,
        cookies: cookies.clone(),
    };

    #[cfg(feature = "test-mode")]
    let test_state = test::TestState {
        db,
        issuer,
        cookies,
    };

    let router = Router::new().nest("/auth", auth::router(auth_state));

    #[cfg(feature = "test-mode")]
    let router = router.nest("/test", test::router(test_state));

    router
}
