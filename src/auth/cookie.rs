//! Cookie parsing and formatting for the token pipeline.

use axum::http::header;

/// Cookie name for the access token (short-lived, minutes).
pub const ACCESS_COOKIE_NAME: &str = "ACCESS_TOKEN";

/// Cookie name for the refresh token (long-lived, days).
pub const REFRESH_COOKIE_NAME: &str = "REFRESH_TOKEN";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// SameSite attribute applied to issued cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes stamped onto every cookie this service sets.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    /// Domain attribute, for serving across subdomains.
    pub domain: Option<String>,
    pub same_site: SameSite,
    /// Set the Secure attribute. Browsers require it for SameSite=None.
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            domain: None,
            same_site: SameSite::Lax,
            secure: false,
        }
    }
}

impl CookieSettings {
    /// Format a Set-Cookie value carrying `value` for `max_age` seconds.
    /// HttpOnly and Path=/ are unconditional.
    pub fn build(&self, name: &str, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite={}; Path=/; Max-Age={}",
            name,
            value,
            self.same_site.as_str(),
            max_age
        );
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Format a Set-Cookie value that removes the named cookie.
    pub fn clear(&self, name: &str) -> String {
        self.build(name, "", 0)
    }
}
