#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use jsonwebtoken::{EncodingKey, Header};
use portcullis::auth::{CookieSettings, TokenGroup, TokenIssuer, TokenTtl};
use portcullis::db::{Database, Principal, Provider};
use portcullis::jwt::{Claims, KeyDomain, TokenCodec, unix_now};
use portcullis::{ServerConfig, create_app};
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"access-secret-for-testing-0123456789";
pub const REFRESH_SECRET: &[u8] = b"refresh-secret-for-testing-0123456789";

pub struct TestContext {
    pub app: Router,
    pub db: Database,
    pub codec: Arc<TokenCodec>,
    pub issuer: TokenIssuer,
}

impl TestContext {
    pub async fn new() -> Self {
        let db = Database::open(":memory:").await.expect("Failed to open database");
        Self::with_database(db)
    }

    /// Build a context over an existing database. Concurrency tests pass
    /// a file-backed database here; pooled in-memory databases do not
    /// share state between connections.
    pub fn with_database(db: Database) -> Self {
        let config = ServerConfig {
            db: db.clone(),
            access_secret: ACCESS_SECRET.to_vec(),
            refresh_secret: REFRESH_SECRET.to_vec(),
            ttl: TokenTtl::default(),
            cookies: CookieSettings::default(),
            store_timeout: Duration::from_secs(3),
        };
        let app = create_app(&config);
        let codec = Arc::new(TokenCodec::new(ACCESS_SECRET, REFRESH_SECRET));
        let issuer = TokenIssuer::new(codec.clone(), db.clone(), TokenTtl::default());

        Self {
            app,
            db,
            codec,
            issuer,
        }
    }

    /// Create a principal backed by a Google identity.
    pub async fn create_principal(&self, provider_id: &str) -> Principal {
        self.db
            .principals()
            .find_or_create(Provider::Google, provider_id)
            .await
            .expect("Failed to create principal")
    }

    /// Create a principal and issue it a full token pair, refresh token
    /// stored. This is the state of a freshly logged-in client.
    pub async fn create_session(&self, provider_id: &str) -> (Principal, TokenGroup) {
        let principal = self.create_principal(provider_id).await;
        let group = self
            .issuer
            .issue_group(&principal.id, principal.provider)
            .await
            .expect("Failed to issue tokens");
        (principal, group)
    }

    /// Build an access token that expired in the past, signed with the
    /// real access key. Clients present these after sitting idle.
    pub fn expired_access_token(&self, principal: &Principal) -> String {
        let now = unix_now().expect("Failed to read clock");
        let claims = Claims {
            sub: principal.id.clone(),
            provider: principal.provider,
            domain: KeyDomain::Access,
            jti: "expired-access".to_string(),
            iat: now - 600,
            exp: now - 300,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(ACCESS_SECRET),
        )
        .expect("Failed to sign token")
    }

    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed")
    }

    pub async fn get(&self, path: &str) -> Response<Body> {
        self.request(
            Request::builder()
                .uri(path)
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
    }

    pub async fn get_with_cookies(&self, path: &str, cookies: &str) -> Response<Body> {
        self.request(
            Request::builder()
                .uri(path)
                .header(header::COOKIE, cookies)
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
    }

    pub async fn get_with_bearer(&self, path: &str, token: &str) -> Response<Body> {
        self.request(
            Request::builder()
                .uri(path)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
    }

    pub async fn post_with_cookies(&self, path: &str, cookies: &str) -> Response<Body> {
        self.request(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::COOKIE, cookies)
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
    }

    pub async fn post_with_bearer(&self, path: &str, token: &str) -> Response<Body> {
        self.request(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
    }

    pub async fn post(&self, path: &str) -> Response<Body> {
        self.request(
            Request::builder()
                .method("POST")
                .uri(path)
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
    }
}

/// Format a Cookie request header carrying both tokens.
pub fn session_cookies(group: &TokenGroup) -> String {
    format!(
        "ACCESS_TOKEN={}; REFRESH_TOKEN={}",
        group.access.token, group.refresh.token
    )
}

/// All Set-Cookie values on a response, in header order.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// The value a browser would end up storing for the named cookie after
/// this response. Browsers honor the last Set-Cookie per name, so scan
/// from the back. None means the response never touched the cookie.
pub fn set_cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response).into_iter().rev().find_map(|cookie| {
        let pair = cookie.split(';').next().unwrap_or("").trim();
        let (cookie_name, value) = pair.split_once('=')?;
        (cookie_name == name).then(|| value.to_string())
    })
}

/// True when the response instructs the browser to drop the named cookie.
pub fn clears_cookie(response: &Response<Body>, name: &str) -> bool {
    set_cookies(response).iter().any(|cookie| {
        cookie.starts_with(&format!("{}=;", name)) && cookie.contains("Max-Age=0")
    })
}

/// Read the response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Failed to parse body")
}

/// Assert helper for endpoints that require an authenticated caller.
pub async fn assert_unauthorized(response: Response<Body>) {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}
