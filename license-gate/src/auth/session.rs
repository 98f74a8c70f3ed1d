//! Session tokens
//!
//! A session is an HS256 JWT carried in the HttpOnly `session` cookie. It
//! only names the user; role and tenant are re-read from storage on every
//! request, so demoting or moving a user takes effect immediately.

use http::HeaderMap;
use http::header::{COOKIE, HeaderValue};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "session";
pub const FINGERPRINT_COOKIE: &str = "fp";

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

/// Signs and verifies session tokens
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_minutes: i64,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("ttl_minutes", &self.ttl_minutes)
            .finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_minutes,
        }
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.ttl_minutes
    }

    pub fn issue(&self, user_id: i64) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            exp: (now + chrono::Duration::minutes(self.ttl_minutes)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
    }

    /// User id of a valid, unexpired token
    pub fn verify(&self, token: &str) -> Option<i64> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &Validation::default())
            .map_err(|e| tracing::debug!("Session token rejected: {e}"))
            .ok()?;
        data.claims.sub.parse().ok()
    }

    /// `Set-Cookie` value carrying a fresh session
    pub fn session_cookie(&self, token: &str, secure: bool) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.ttl_minutes * 60
        );
        if secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// `Set-Cookie` value that removes the session
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Value of cookie `name` from every `Cookie` header of the request
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let keys = SessionKeys::new("test-secret", 30);
        let token = keys.issue(42).unwrap();
        assert_eq!(keys.verify(&token), Some(42));

        let other = SessionKeys::new("another-secret", 30);
        assert_eq!(other.verify(&token), None);
        assert_eq!(keys.verify("garbage"), None);
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = SessionKeys::new("test-secret", -10);
        let token = keys.issue(1).unwrap();
        assert_eq!(keys.verify(&token), None);
    }

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; fp=abc123"));
        headers.append(COOKIE, HeaderValue::from_static("session=tok"));
        assert_eq!(cookie_value(&headers, "fp").as_deref(), Some("abc123"));
        assert_eq!(cookie_value(&headers, "session").as_deref(), Some("tok"));
        assert_eq!(cookie_value(&headers, "missing"), None);

        let mut empty = HeaderMap::new();
        empty.append(COOKIE, HeaderValue::from_static("fp="));
        assert_eq!(cookie_value(&empty, "fp"), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let keys = SessionKeys::new("s", 30);
        let cookie = keys.session_cookie("tok", true);
        assert!(cookie.starts_with("session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=1800"));
        assert!(cookie.ends_with("; Secure"));
    }
}
