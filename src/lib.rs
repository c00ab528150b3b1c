pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware, routing::get};
use tokio::net::TcpListener;
use tower::ServiceBuilder;

use api::create_api_router;
use auth::{
    CookieSettings, GatekeeperState, RefreshCoordinator, TokenIssuer, TokenTtl, bearer_gatekeeper,
    cookie_gatekeeper,
};
use db::Database;
use jwt::TokenCodec;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Signing secret for the access key domain
    pub access_secret: Vec<u8>,
    /// Signing secret for the refresh key domain
    pub refresh_secret: Vec<u8>,
    /// Token lifetimes for both domains
    pub ttl: TokenTtl,
    /// Attributes applied to every issued cookie
    pub cookies: CookieSettings,
    /// Deadline for store calls made on the request path
    pub store_timeout: Duration,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let codec = Arc::new(TokenCodec::new(
        &config.access_secret,
        &config.refresh_secret,
    ));
    let issuer = TokenIssuer::new(codec.clone(), config.db.clone(), config.ttl);
    let coordinator = Arc::new(RefreshCoordinator::new(
        codec.clone(),
        config.db.clone(),
        issuer.clone(),
        config.cookies.clone(),
        config.store_timeout,
    ));

    let gatekeeper = GatekeeperState {
        codec: codec.clone(),
        db: config.db.clone(),
        coordinator,
        store_timeout: config.store_timeout,
    };

    let api_router = create_api_router(config.db.clone(), codec, issuer, config.cookies.clone());

    // Layers run outermost first, so the cookie stage sees every request
    // before the bearer stage does.
    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api_router)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(
                    gatekeeper.clone(),
                    cookie_gatekeeper,
                ))
                .layer(middleware::from_fn_with_state(
                    gatekeeper,
                    bearer_gatekeeper,
                )),
        )
}

/// Liveness probe. States nothing about any session.
async fn healthz() -> &'static str {
    "ok"
}

/// Run cleanup once and start the background cleanup scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database, refresh_ttl: Duration) {
    cleanup::run_cleanup(db, refresh_ttl).await;
    cleanup::spawn_cleanup_scheduler(db.clone(), refresh_ttl);
}

/// Run the server on the given listener. Blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}
