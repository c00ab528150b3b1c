//! Failure taxonomy for the authentication pipeline.

use crate::jwt::TokenError;

/// Why a credential did not produce an identity.
///
/// None of these abort a request on their own. The gatekeeper logs the
/// failure and moves on; whether the request ultimately gets a 401 is the
/// route's decision, not the pipeline's.
#[derive(Debug)]
pub enum AuthFailure {
    /// No credential of the expected kind was presented
    CredentialMissing,
    /// Token could not be parsed or decoded
    TokenMalformed,
    /// Signature did not verify against the expected key
    TokenSignatureInvalid,
    /// Token is past its expiry
    TokenExpired,
    /// Token belongs to the other key domain
    TokenWrongDomain,
    /// Presented refresh token is not the stored one
    RefreshNotCurrent,
    /// Verified subject no longer resolves to a principal
    PrincipalNotFound,
    /// The backing store failed or timed out
    StoreUnavailable(String),
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailure::CredentialMissing => write!(f, "Credential missing"),
            AuthFailure::TokenMalformed => write!(f, "Token malformed"),
            AuthFailure::TokenSignatureInvalid => write!(f, "Token signature invalid"),
            AuthFailure::TokenExpired => write!(f, "Token expired"),
            AuthFailure::TokenWrongDomain => write!(f, "Token from wrong key domain"),
            AuthFailure::RefreshNotCurrent => write!(f, "Refresh token superseded"),
            AuthFailure::PrincipalNotFound => write!(f, "Principal not found"),
            AuthFailure::StoreUnavailable(detail) => write!(f, "Store unavailable: {}", detail),
        }
    }
}

impl std::error::Error for AuthFailure {}

impl AuthFailure {
    /// A store call that exceeded its deadline.
    pub fn store_timeout() -> Self {
        AuthFailure::StoreUnavailable("timed out".to_string())
    }

    /// Log this failure at the severity it deserves. A broken store is an
    /// operational problem; everything else is routine traffic.
    pub fn log(&self, stage: &str) {
        match self {
            AuthFailure::StoreUnavailable(detail) => {
                tracing::error!("{}: store unavailable: {}", stage, detail);
            }
            other => {
                tracing::debug!("{}: credential rejected: {}", stage, other);
            }
        }
    }
}

impl From<TokenError> for AuthFailure {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Malformed => AuthFailure::TokenMalformed,
            TokenError::SignatureInvalid => AuthFailure::TokenSignatureInvalid,
            TokenError::Expired => AuthFailure::TokenExpired,
            TokenError::WrongDomain => AuthFailure::TokenWrongDomain,
            // Sign-side errors; verification never produces them.
            TokenError::Encoding(_) | TokenError::Clock => AuthFailure::TokenMalformed,
        }
    }
}

impl From<sqlx::Error> for AuthFailure {
    fn from(e: sqlx::Error) -> Self {
        AuthFailure::StoreUnavailable(e.to_string())
    }
}
