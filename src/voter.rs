// src/voter.rs
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use http::header::{COOKIE, SET_COOKIE};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;

pub const VOTER_TOKEN_COOKIE: &str = "voter_token";
const COOKIE_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;
const MAX_TOKEN_LEN: usize = 128;

/// Opaque per-browser voter identity, attached to the request by
/// [`ensure_voter_token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterToken(pub String);

impl VoterToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_token(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_TOKEN_LEN
        && value.bytes().all(|b| b.is_ascii_graphic() && b != b';' && b != b',')
}

/// Pull the voter token out of the `Cookie` headers, if a usable one exists.
pub fn token_from_headers(headers: &HeaderMap) -> Option<VoterToken> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == VOTER_TOKEN_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| is_valid_token(value))
        .map(|value| VoterToken(value.to_string()))
}

pub fn voter_cookie(token: &VoterToken, secure: bool) -> String {
    let mut cookie = format!(
        "{VOTER_TOKEN_COOKIE}={}; Path=/; Max-Age={COOKIE_MAX_AGE_SECS}; HttpOnly; SameSite=Strict",
        token.as_str()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Middleware that makes sure every request carries a [`VoterToken`]
/// extension, issuing a fresh cookie when the browser has none.
pub async fn ensure_voter_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let (token, issued) = match token_from_headers(request.headers()) {
        Some(token) => (token, false),
        None => (VoterToken::generate(), true),
    };
    request.extensions_mut().insert(token.clone());

    let mut response = next.run(request).await;

    if issued {
        match HeaderValue::from_str(&voter_cookie(&token, state.config.cookie_secure)) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
                debug!("Issued new voter token");
            }
            Err(e) => warn!(error = %e, "Could not encode voter cookie"),
        }
    }

    response
}

/// Best-effort originating address of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub Option<String>);

pub fn client_addr(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    forwarded.or_else(|| peer.map(|addr| addr.ip().to_string()))
}

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientAddr(client_addr(&parts.headers, peer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn token_is_read_among_other_cookies() {
        let map = headers(&[("cookie", "theme=dark; voter_token=abc-123; lang=en")]);
        assert_eq!(token_from_headers(&map), Some(VoterToken("abc-123".to_string())));
    }

    #[test]
    fn missing_or_malformed_token_is_none() {
        assert_eq!(token_from_headers(&headers(&[("cookie", "theme=dark")])), None);
        assert_eq!(token_from_headers(&headers(&[("cookie", "voter_token=")])), None);

        let oversized = format!("voter_token={}", "x".repeat(MAX_TOKEN_LEN + 1));
        assert_eq!(token_from_headers(&headers(&[("cookie", oversized.as_str())])), None);
    }

    #[test]
    fn cookie_attributes() {
        let token = VoterToken("t1".to_string());

        let cookie = voter_cookie(&token, false);
        assert!(cookie.starts_with("voter_token=t1;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=2592000"));
        assert!(!cookie.contains("Secure"));

        assert!(voter_cookie(&token, true).ends_with("; Secure"));
    }

    #[test]
    fn forwarded_for_wins_over_peer() {
        let peer: SocketAddr = "10.0.0.9:4000".parse().unwrap();

        let map = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        assert_eq!(client_addr(&map, Some(peer)).as_deref(), Some("203.0.113.7"));

        assert_eq!(client_addr(&HeaderMap::new(), Some(peer)).as_deref(), Some("10.0.0.9"));
        assert_eq!(client_addr(&HeaderMap::new(), None), None);
    }
}
