//! JWT signing and verification for the two token key domains.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::db::Provider;

/// Key domain a token belongs to. Each domain is signed with its own
/// independent secret so a leaked token from one domain can never be
/// presented as the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyDomain {
    /// Short-lived access token (minutes) - stateless
    Access,
    /// Long-lived refresh token (days) - backed by a store record
    Refresh,
}

/// JWT claims carried by both token domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal UUID)
    pub sub: String,
    /// Identity provider the principal signed up through
    pub provider: Provider,
    /// Key domain tag
    #[serde(rename = "typ")]
    pub domain: KeyDomain,
    /// Unique token id. Two signings for the same subject in the same
    /// second still produce distinct tokens.
    pub jti: String,
    /// Issued at (Unix seconds)
    pub iat: u64,
    /// Expiration time (Unix seconds)
    pub exp: u64,
}

/// A freshly signed token with its timestamps.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// The JWT token string
    pub token: String,
    /// Issued at (Unix seconds)
    pub issued_at: u64,
    /// Expiration time (Unix seconds)
    pub expires_at: u64,
}

struct DomainKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl DomainKeys {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Signs and verifies tokens, holding one HS256 key pair per domain.
pub struct TokenCodec {
    access: DomainKeys,
    refresh: DomainKeys,
}

impl TokenCodec {
    /// Create a codec from the two domain secrets.
    /// The secrets must differ; see `cli::load_signing_secrets`.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access: DomainKeys::new(access_secret),
            refresh: DomainKeys::new(refresh_secret),
        }
    }

    fn keys(&self, domain: KeyDomain) -> &DomainKeys {
        match domain {
            KeyDomain::Access => &self.access,
            KeyDomain::Refresh => &self.refresh,
        }
    }

    /// Sign a token for the given domain and subject, expiring after `ttl`.
    pub fn sign(
        &self,
        domain: KeyDomain,
        subject: &str,
        provider: Provider,
        ttl: Duration,
    ) -> Result<SignedToken, TokenError> {
        let now = unix_now()?;
        let exp = now + ttl.as_secs();

        let claims = Claims {
            sub: subject.to_string(),
            provider,
            domain,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.keys(domain).encoding)
            .map_err(TokenError::Encoding)?;

        Ok(SignedToken {
            token,
            issued_at: now,
            expires_at: exp,
        })
    }

    /// Verify a token against the given domain's key and decode its claims.
    ///
    /// A token signed for the other domain fails with `WrongDomain`: the
    /// signature check fails against this domain's key, and the opposite key
    /// is probed (ignoring expiry) to classify the failure. The `typ` claim
    /// check covers deployments where both secrets were set to the same value.
    pub fn verify(&self, domain: KeyDomain, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data =
            jsonwebtoken::decode::<Claims>(token, &self.keys(domain).decoding, &validation);

        let claims = match token_data {
            Ok(data) => data.claims,
            Err(e) => {
                use jsonwebtoken::errors::ErrorKind;
                return Err(match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    ErrorKind::InvalidSignature => {
                        if self.signed_for_other_domain(domain, token) {
                            TokenError::WrongDomain
                        } else {
                            TokenError::SignatureInvalid
                        }
                    }
                    _ => TokenError::Malformed,
                });
            }
        };

        if claims.domain != domain {
            return Err(TokenError::WrongDomain);
        }

        Ok(claims)
    }

    /// Check whether a token that failed this domain's signature check was
    /// actually signed for the opposite domain. Expiry is ignored: the
    /// classification must be stable for expired tokens too.
    fn signed_for_other_domain(&self, domain: KeyDomain, token: &str) -> bool {
        let other = match domain {
            KeyDomain::Access => KeyDomain::Refresh,
            KeyDomain::Refresh => KeyDomain::Access,
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;

        match jsonwebtoken::decode::<Claims>(token, &self.keys(other).decoding, &validation) {
            Ok(data) => data.claims.domain == other,
            Err(_) => false,
        }
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::Clock)
}

/// Errors that can occur during token operations.
#[derive(Debug)]
pub enum TokenError {
    /// Token could not be parsed or decoded
    Malformed,
    /// Signature does not match this domain's key
    SignatureInvalid,
    /// Token is past its expiration time
    Expired,
    /// Token was signed for the other key domain
    WrongDomain,
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// System clock is before the Unix epoch
    Clock,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "Malformed token"),
            TokenError::SignatureInvalid => write!(f, "Token signature invalid"),
            TokenError::Expired => write!(f, "Token expired"),
            TokenError::WrongDomain => write!(f, "Token signed for a different key domain"),
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Clock => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for TokenError {}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_SECRET: &[u8] = b"access-secret-for-testing-0123456789";
    const REFRESH_SECRET: &[u8] = b"refresh-secret-for-testing-0123456789";

    fn codec() -> TokenCodec {
        TokenCodec::new(ACCESS_SECRET, REFRESH_SECRET)
    }

    #[test]
    fn test_sign_and_verify_access_token() {
        let codec = codec();

        let signed = codec
            .sign(
                KeyDomain::Access,
                "uuid-123",
                Provider::Google,
                Duration::from_secs(900),
            )
            .unwrap();

        assert_eq!(signed.expires_at - signed.issued_at, 900);

        let claims = codec.verify(KeyDomain::Access, &signed.token).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.provider, Provider::Google);
        assert_eq!(claims.domain, KeyDomain::Access);
        assert_eq!(claims.exp, signed.expires_at);
    }

    #[test]
    fn test_sign_and_verify_refresh_token() {
        let codec = codec();

        let signed = codec
            .sign(
                KeyDomain::Refresh,
                "uuid-123",
                Provider::Kakao,
                Duration::from_secs(14 * 24 * 60 * 60),
            )
            .unwrap();

        let claims = codec.verify(KeyDomain::Refresh, &signed.token).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.provider, Provider::Kakao);
        assert_eq!(claims.domain, KeyDomain::Refresh);
    }

    #[test]
    fn test_cross_domain_rejected_as_wrong_domain() {
        let codec = codec();

        let access = codec
            .sign(
                KeyDomain::Access,
                "uuid-123",
                Provider::Google,
                Duration::from_secs(900),
            )
            .unwrap();
        let refresh = codec
            .sign(
                KeyDomain::Refresh,
                "uuid-123",
                Provider::Google,
                Duration::from_secs(1000),
            )
            .unwrap();

        assert!(matches!(
            codec.verify(KeyDomain::Refresh, &access.token),
            Err(TokenError::WrongDomain)
        ));
        assert!(matches!(
            codec.verify(KeyDomain::Access, &refresh.token),
            Err(TokenError::WrongDomain)
        ));
    }

    #[test]
    fn test_cross_domain_rejected_with_identical_secrets() {
        // Same secret for both domains: the signature verifies, so only the
        // typ claim can catch the mixup.
        let codec = TokenCodec::new(ACCESS_SECRET, ACCESS_SECRET);

        let access = codec
            .sign(
                KeyDomain::Access,
                "uuid-123",
                Provider::Google,
                Duration::from_secs(900),
            )
            .unwrap();

        assert!(matches!(
            codec.verify(KeyDomain::Refresh, &access.token),
            Err(TokenError::WrongDomain)
        ));
    }

    #[test]
    fn test_expired_token() {
        let now = unix_now().unwrap();

        // Build claims with exp in the past
        let claims = Claims {
            sub: "uuid-123".to_string(),
            provider: Provider::Google,
            domain: KeyDomain::Access,
            jti: "test-jti".to_string(),
            iat: now - 100,
            exp: now - 50,
        };

        let encoding_key = EncodingKey::from_secret(ACCESS_SECRET);
        let token = jsonwebtoken::encode(&Header::default(), &claims, &encoding_key).unwrap();

        assert!(matches!(
            codec().verify(KeyDomain::Access, &token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_expired_cross_domain_still_wrong_domain() {
        let now = unix_now().unwrap();

        let claims = Claims {
            sub: "uuid-123".to_string(),
            provider: Provider::Google,
            domain: KeyDomain::Refresh,
            jti: "test-jti".to_string(),
            iat: now - 100,
            exp: now - 50,
        };

        let encoding_key = EncodingKey::from_secret(REFRESH_SECRET);
        let token = jsonwebtoken::encode(&Header::default(), &claims, &encoding_key).unwrap();

        assert!(matches!(
            codec().verify(KeyDomain::Access, &token),
            Err(TokenError::WrongDomain)
        ));
    }

    #[test]
    fn test_tokens_are_unique_per_issue() {
        let codec = codec();

        let a = codec
            .sign(
                KeyDomain::Refresh,
                "uuid-123",
                Provider::Google,
                Duration::from_secs(1000),
            )
            .unwrap();
        let b = codec
            .sign(
                KeyDomain::Refresh,
                "uuid-123",
                Provider::Google,
                Duration::from_secs(1000),
            )
            .unwrap();

        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_garbage_token_is_malformed() {
        assert!(matches!(
            codec().verify(KeyDomain::Access, "not-a-token"),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_foreign_secret_is_signature_invalid() {
        let foreign = TokenCodec::new(b"some-other-access-secret-entirely!", REFRESH_SECRET);

        let signed = foreign
            .sign(
                KeyDomain::Access,
                "uuid-123",
                Provider::Google,
                Duration::from_secs(900),
            )
            .unwrap();

        assert!(matches!(
            codec().verify(KeyDomain::Access, &signed.token),
            Err(TokenError::SignatureInvalid)
        ));
    }
}
