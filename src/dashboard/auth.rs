//! HTTP Basic authentication middleware.
//!
//! Every route, static files included, sits behind this layer.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::sync::Arc;
use tracing::debug;

use crate::config::AuthConfig;

/// Body of the 401 response.
pub const UNAUTHORIZED_BODY: &str = "Authentication required.";

/// Accepted credentials and the realm announced in the challenge.
#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
    challenge: HeaderValue,
}

impl BasicAuth {
    pub fn new(auth: &AuthConfig, realm: &str) -> Self {
        let realm = realm.replace('"', "'");
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm))
            .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
        Self {
            username: auth.username.clone(),
            password: auth.password.clone(),
            challenge,
        }
    }

    /// Check the `Authorization` header of a request.
    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        match parse_basic_credentials(headers) {
            Some((user, pass)) => {
                // Evaluate both comparisons so timing does not reveal which one failed.
                let user_ok = constant_time_eq(user.as_bytes(), self.username.as_bytes());
                let pass_ok = constant_time_eq(pass.as_bytes(), self.password.as_bytes());
                user_ok & pass_ok
            }
            None => false,
        }
    }

    fn challenge_response(&self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, self.challenge.clone())],
            UNAUTHORIZED_BODY,
        )
            .into_response()
    }
}

/// Decode `Authorization: Basic <base64(user:pass)>`.
pub fn parse_basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub(crate) async fn require_basic_auth(
    State(auth): State<Arc<BasicAuth>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if auth.authorize(request.headers()) {
        return next.run(request).await;
    }
    debug!(
        method = %request.method(),
        path = %request.uri().path(),
        "Rejected unauthenticated request"
    );
    auth.challenge_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn auth() -> BasicAuth {
        BasicAuth::new(&AuthConfig::default(), "Westmere Factory Development Dashboard")
    }

    #[test]
    fn test_accepts_valid_credentials() {
        let encoded = STANDARD.encode("westmere:sfc-vietnam-2025");
        assert!(auth().authorize(&headers_with(&format!("Basic {encoded}"))));
    }

    #[test]
    fn test_rejects_wrong_password() {
        let encoded = STANDARD.encode("westmere:nope");
        assert!(!auth().authorize(&headers_with(&format!("Basic {encoded}"))));
    }

    #[test]
    fn test_rejects_missing_and_malformed_headers() {
        assert!(!auth().authorize(&HeaderMap::new()));
        assert!(!auth().authorize(&headers_with("Bearer abc")));
        assert!(!auth().authorize(&headers_with("Basic !!!not-base64")));
    }

    #[test]
    fn test_password_may_contain_colon() {
        let encoded = STANDARD.encode("user:pa:ss");
        let parsed = parse_basic_credentials(&headers_with(&format!("basic {encoded}")));
        assert_eq!(parsed, Some(("user".to_string(), "pa:ss".to_string())));
    }

    #[test]
    fn test_challenge_header() {
        let response = auth().challenge_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"Westmere Factory Development Dashboard\""
        );
    }
}
