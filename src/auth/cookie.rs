//! `jwt` session cookie formatting and parsing.

use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};

pub const COOKIE_NAME: &str = "jwt";
/// Placeholder value written on logout; never treated as a token.
pub const LOGGED_OUT: &str = "loggedout";

const LOGOUT_TTL_SECS: i64 = 10;

/// `Set-Cookie` value carrying a freshly issued token.
pub fn session_cookie(token: &str, expiration_days: i64, secure: bool) -> String {
    build(token, Duration::days(expiration_days), secure)
}

/// `Set-Cookie` value that overwrites the session with [`LOGGED_OUT`].
pub fn logout_cookie(secure: bool) -> String {
    build(LOGGED_OUT, Duration::seconds(LOGOUT_TTL_SECS), secure)
}

fn build(value: &str, ttl: Duration, secure: bool) -> String {
    let expires = (Utc::now() + ttl).format("%a, %d %b %Y %H:%M:%S GMT");
    let mut cookie = format!(
        "{}={}; Expires={}; Max-Age={}; Path=/; HttpOnly; SameSite=None",
        COOKIE_NAME,
        value,
        expires,
        ttl.num_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Token from the `jwt` cookie, if any. Empty and logged-out values count as absent.
pub fn token_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty() && value != LOGGED_OUT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("abc.def.ghi", 90, true);
        assert!(cookie.starts_with("jwt=abc.def.ghi; "));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains(&format!("Max-Age={}", 90 * 24 * 3600)));
        assert!(cookie.ends_with("; Secure"));
        assert!(!session_cookie("t", 1, false).contains("Secure"));
    }

    #[test]
    fn logout_cookie_expires_quickly() {
        let cookie = logout_cookie(false);
        assert!(cookie.starts_with("jwt=loggedout; "));
        assert!(cookie.contains("Max-Age=10"));
    }

    #[test]
    fn reads_token_among_other_cookies() {
        let headers = headers_with("theme=dark; jwt=tok123; lang=en");
        assert_eq!(token_from_cookies(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn logged_out_cookie_is_no_token() {
        assert!(token_from_cookies(&headers_with("jwt=loggedout")).is_none());
        assert!(token_from_cookies(&headers_with("jwt=")).is_none());
        assert!(token_from_cookies(&HeaderMap::new()).is_none());
    }
}
