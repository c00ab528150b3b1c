//! The authentication pipeline.
//!
//! Dual-token scheme: short-lived stateless access tokens and long-lived
//! refresh tokens tracked one-per-principal in the store. Two gatekeeper
//! middleware stages (cookies first, then bearer) attach a
//! [`RequestIdentity`] extension; routes that need one pull it back out
//! with [`CurrentUser`]. Expired sessions are reissued in place when the
//! refresh cookie still matches the stored token.

mod cookie;
mod errors;
mod extract;
mod gatekeeper;
mod identity;
mod issuer;
mod refresh;

pub use cookie::{ACCESS_COOKIE_NAME, CookieSettings, REFRESH_COOKIE_NAME, SameSite, get_cookie};
pub use errors::AuthFailure;
pub use extract::{RequestCredentials, bearer_token};
pub use gatekeeper::{GatekeeperState, bearer_gatekeeper, cookie_gatekeeper};
pub use identity::{Authority, CurrentUser, MaybeUser, RequestIdentity, resolve_identity};
pub use issuer::{IssueError, TokenGroup, TokenIssuer, TokenTtl};
pub use refresh::{RefreshCoordinator, RefreshOutcome};
