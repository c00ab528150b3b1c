//! Command-line interface and startup configuration.

use std::time::Duration;

use clap::Parser;
use tracing::{error, warn};

use crate::ServerConfig;
use crate::auth::{CookieSettings, SameSite, TokenTtl};
use crate::db::Database;

/// Minimum length for signing secrets, in bytes.
const MIN_SECRET_LENGTH: usize = 32;

#[derive(Parser, Debug, Clone)]
#[command(name = "Portcullis")]
#[command(about = "Cookie and bearer token authentication service", long_about = None)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "portcullis.db")]
    pub database: String,

    /// Access token lifetime in seconds
    #[arg(long, default_value = "900")]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value = "1209600")]
    pub refresh_ttl_secs: u64,

    /// Domain attribute for issued cookies (host-only when omitted)
    #[arg(long)]
    pub cookie_domain: Option<String>,

    /// SameSite attribute for issued cookies
    #[arg(long, default_value = "lax")]
    pub cookie_same_site: SameSite,

    /// Set the Secure attribute on issued cookies
    #[arg(long)]
    pub secure_cookies: bool,

    /// Deadline for store calls made on the request path, in milliseconds
    #[arg(long, default_value = "3000")]
    pub store_timeout_ms: u64,

    /// Path to a file containing the access token signing secret.
    /// Prefer the ACCESS_TOKEN_SECRET environment variable
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to a file containing the refresh token signing secret.
    /// Prefer the REFRESH_TOKEN_SECRET environment variable
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load one signing secret from an environment variable, falling back to
/// a file when one was given. Returns None after logging when the secret
/// is missing or too short.
pub fn load_signing_secret(env_var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the variable so the secret does not leak into child
        // processes or debug dumps of the environment.
        // SAFETY: runs during startup, before anything else reads or
        // writes the environment.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!("Failed to read secret file {}: {}", path, e);
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable (recommended) or pass a secret file",
            env_var
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} bytes. Use a longer secret",
            env_var, MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both signing secrets. The two key domains must never share a
/// secret, or a token signed for one domain would verify under the other.
pub fn load_signing_secrets(args: &Args) -> Option<(String, String)> {
    let access = load_signing_secret("ACCESS_TOKEN_SECRET", args.access_secret_file.as_deref())?;
    let refresh = load_signing_secret("REFRESH_TOKEN_SECRET", args.refresh_secret_file.as_deref())?;

    if access == refresh {
        error!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        return None;
    }

    Some((access, refresh))
}

/// Check the configured token lifetimes. Access tokens are the
/// short-lived half of the scheme and must expire before the refresh
/// token that renews them.
pub fn validate_ttls(args: &Args) -> Option<TokenTtl> {
    if args.access_ttl_secs == 0 || args.refresh_ttl_secs == 0 {
        error!("Token lifetimes must be positive");
        return None;
    }

    if args.access_ttl_secs >= args.refresh_ttl_secs {
        error!(
            "Access token lifetime ({}s) must be shorter than the refresh token lifetime ({}s)",
            args.access_ttl_secs, args.refresh_ttl_secs
        );
        return None;
    }

    Some(TokenTtl {
        access: Duration::from_secs(args.access_ttl_secs),
        refresh: Duration::from_secs(args.refresh_ttl_secs),
    })
}

/// Build the cookie attribute set, warning about combinations browsers
/// will refuse to store.
pub fn build_cookie_settings(args: &Args) -> CookieSettings {
    if args.cookie_same_site == SameSite::None && !args.secure_cookies {
        warn!("SameSite=None cookies require the Secure attribute; browsers will drop these");
    }

    CookieSettings {
        domain: args.cookie_domain.clone(),
        same_site: args.cookie_same_site,
        secure: args.secure_cookies,
    }
}

/// Open the database. Returns None after logging on failure.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => Some(db),
        Err(e) => {
            error!("Failed to open database at {}: {}", path, e);
            None
        }
    }
}

/// Assemble the server configuration from validated pieces.
pub fn build_config(
    args: &Args,
    db: Database,
    access_secret: String,
    refresh_secret: String,
    ttl: TokenTtl,
) -> ServerConfig {
    ServerConfig {
        db,
        access_secret: access_secret.into_bytes(),
        refresh_secret: refresh_secret.into_bytes(),
        ttl,
        cookies: build_cookie_settings(args),
        store_timeout: Duration::from_millis(args.store_timeout_ms),
    }
}
