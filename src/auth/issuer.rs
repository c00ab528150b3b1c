//! Token issuance for both key domains.

use std::sync::Arc;
use std::time::Duration;

use crate::db::{Database, Provider};
use crate::jwt::{KeyDomain, SignedToken, TokenCodec, TokenError};

/// Lifetimes for the two token domains. The access lifetime must stay well
/// below the refresh lifetime; `cli::validate_ttls` refuses anything else.
#[derive(Debug, Clone, Copy)]
pub struct TokenTtl {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenTtl {
    fn default() -> Self {
        Self {
            access: Duration::from_secs(15 * 60),
            refresh: Duration::from_secs(14 * 24 * 60 * 60),
        }
    }
}

/// A freshly issued access and refresh pair.
#[derive(Debug, Clone)]
pub struct TokenGroup {
    pub access: SignedToken,
    pub refresh: SignedToken,
}

/// Errors from issuing tokens.
#[derive(Debug)]
pub enum IssueError {
    /// Signing failed
    Sign(TokenError),
    /// The refresh token record could not be written
    Store(sqlx::Error),
}

impl std::fmt::Display for IssueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueError::Sign(e) => write!(f, "Failed to sign token: {}", e),
            IssueError::Store(e) => write!(f, "Failed to persist refresh token: {}", e),
        }
    }
}

impl std::error::Error for IssueError {}

impl From<TokenError> for IssueError {
    fn from(e: TokenError) -> Self {
        IssueError::Sign(e)
    }
}

impl From<sqlx::Error> for IssueError {
    fn from(e: sqlx::Error) -> Self {
        IssueError::Store(e)
    }
}

/// Issues tokens. Refresh issuance writes the store record; the token a
/// client holds is only honored while it matches that record.
#[derive(Clone)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    db: Database,
    ttl: TokenTtl,
}

impl TokenIssuer {
    pub fn new(codec: Arc<TokenCodec>, db: Database, ttl: TokenTtl) -> Self {
        Self { codec, db, ttl }
    }

    pub fn ttl(&self) -> TokenTtl {
        self.ttl
    }

    /// Sign a stateless access token.
    pub fn issue_access(
        &self,
        subject: &str,
        provider: Provider,
    ) -> Result<SignedToken, IssueError> {
        Ok(self
            .codec
            .sign(KeyDomain::Access, subject, provider, self.ttl.access)?)
    }

    /// Sign a refresh token and store it as the subject's one live token,
    /// retiring whatever was stored before.
    pub async fn issue_refresh(
        &self,
        subject: &str,
        provider: Provider,
    ) -> Result<SignedToken, IssueError> {
        let signed = self
            .codec
            .sign(KeyDomain::Refresh, subject, provider, self.ttl.refresh)?;
        self.db.refresh_tokens().upsert(subject, &signed.token).await?;
        Ok(signed)
    }

    /// Issue a refresh and access pair. The refresh side, store write
    /// included, must succeed before the access token is signed.
    pub async fn issue_group(
        &self,
        subject: &str,
        provider: Provider,
    ) -> Result<TokenGroup, IssueError> {
        let refresh = self.issue_refresh(subject, provider).await?;
        let access = self.issue_access(subject, provider)?;
        Ok(TokenGroup { access, refresh })
    }
}
