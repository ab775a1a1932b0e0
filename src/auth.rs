//! Owner resolution for HTTP requests
//!
//! Identity itself is established outside this service. A request is
//! accepted when it carries either a bearer token listed in configuration
//! or, when trusted, the owner header set by the fronting gateway.

use crate::api::error::ApiError;
use crate::config::AuthConfig;
use crate::error::EvalError;
use crate::types::OwnerId;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Resolves the owner of a request from its headers
#[derive(Debug, Clone)]
pub struct Authenticator {
    owner_header: Option<String>,
    tokens: HashMap<String, OwnerId>,
}

impl Authenticator {
    pub fn new(config: &AuthConfig) -> Self {
        let owner_header = config
            .trust_owner_header
            .then(|| config.owner_header.to_ascii_lowercase());
        let tokens = config
            .tokens
            .iter()
            .map(|t| (t.token.clone(), OwnerId::new(t.owner.clone())))
            .collect();

        Self {
            owner_header,
            tokens,
        }
    }

    /// Bearer token first, then the trusted owner header
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<OwnerId> {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        if let Some(token) = bearer {
            return self.tokens.get(token.trim()).cloned();
        }

        let header = self.owner_header.as_deref()?;
        headers
            .get(header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(OwnerId::new)
    }
}

/// Authenticated owner, inserted into request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentOwner(pub OwnerId);

/// Reject requests without a resolvable owner
pub async fn require_owner(
    State(auth): State<Arc<Authenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    match auth.authenticate(request.headers()) {
        Some(owner) => {
            request.extensions_mut().insert(CurrentOwner(owner));
            next.run(request).await
        }
        None => {
            debug!("Rejected unauthenticated {} {}", request.method(), request.uri().path());
            ApiError::from(EvalError::Unauthorized).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenOwner;
    use axum::http::HeaderValue;

    fn config() -> AuthConfig {
        AuthConfig {
            tokens: vec![TokenOwner {
                token: "tok-alice".into(),
                owner: "alice".into(),
            }],
            ..Default::default()
        }
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_owner_header() {
        let auth = Authenticator::new(&config());
        assert_eq!(
            auth.authenticate(&headers(&[("x-owner-id", "bob")])),
            Some(OwnerId::new("bob"))
        );
        assert_eq!(auth.authenticate(&headers(&[("x-owner-id", "  ")])), None);
        assert_eq!(auth.authenticate(&HeaderMap::new()), None);
    }

    #[test]
    fn test_bearer_token() {
        let auth = Authenticator::new(&config());
        assert_eq!(
            auth.authenticate(&headers(&[("authorization", "Bearer tok-alice")])),
            Some(OwnerId::new("alice"))
        );
        // an unknown token does not fall back to the header
        assert_eq!(
            auth.authenticate(&headers(&[
                ("authorization", "Bearer wrong"),
                ("x-owner-id", "bob")
            ])),
            None
        );
    }

    #[test]
    fn test_untrusted_owner_header_is_ignored() {
        let auth = Authenticator::new(&AuthConfig {
            trust_owner_header: false,
            ..config()
        });
        assert_eq!(auth.authenticate(&headers(&[("x-owner-id", "bob")])), None);
    }

    #[test]
    fn test_custom_header_name_is_case_insensitive() {
        let auth = Authenticator::new(&AuthConfig {
            owner_header: "X-Forwarded-User".into(),
            ..config()
        });
        assert_eq!(
            auth.authenticate(&headers(&[("x-forwarded-user", "carol")])),
            Some(OwnerId::new("carol"))
        );
    }
}
