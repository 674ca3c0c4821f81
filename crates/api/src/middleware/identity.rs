//! Caller identity resolution.
//!
//! Every request resolves to exactly one identity, never both:
//! `user:<subject>` when a valid bearer token with subject and email claims is
//! present, otherwise `ip:<hash>` derived from the caller address. A malformed,
//! expired, or unverifiable token is treated exactly like no token - the
//! request proceeds anonymously rather than failing.
//!
//! Usage: add `Caller` as an extractor parameter for identity-scoped handlers,
//! or `AuthUser` where a verified user is required (401 otherwise).
//!
//! ```ignore
//! async fn my_handler(caller: Caller, ...) -> ... {
//!     // caller.identity.key() is "user:..." or "ip:..."
//! }
//! ```

use axum::{
    Json, RequestPartsExt,
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use sha2::{Digest, Sha256};

use crate::state::AppState;

/// Proxy headers consulted for the caller address, most trusted first.
/// The first comma-separated value of the first present header wins.
const ADDRESS_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// Sentinel when no address header is present.
const UNKNOWN_ADDRESS: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Authenticated user, carries the subject claim.
    User(String),
    /// Anonymous caller, carries the salted address hash.
    Anonymous(String),
}

impl Identity {
    /// The key used for rate limiting and interaction records.
    pub fn key(&self) -> String {
        match self {
            Identity::User(id) => format!("user:{}", id),
            Identity::Anonymous(hash) => format!("ip:{}", hash),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User(_))
    }
}

/// Resolved caller: the identity plus the raw address feeding the second
/// rate-limit dimension. The raw address is never persisted under the
/// identity; only its hash is.
pub struct Caller {
    pub identity: Identity,
    pub address: String,
}

/// First address from the proxy headers, or the unknown sentinel.
pub fn client_address(headers: &HeaderMap) -> String {
    for name in ADDRESS_HEADERS {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }

    UNKNOWN_ADDRESS.to_string()
}

/// Deterministic, one-way address hash. The salt keeps the hash from being
/// reversed by enumerating the address space.
pub fn hash_address(address: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(address.as_bytes());
    hex::encode(hasher.finalize())
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let address = client_address(&parts.headers);

        if let Ok(TypedHeader(Authorization(bearer))) =
            parts.extract::<TypedHeader<Authorization<Bearer>>>().await
        {
            match state.verifier.verify(bearer.token()).await {
                Ok(Some(user)) => {
                    return Ok(Caller {
                        identity: Identity::User(user.subject),
                        address,
                    });
                }
                Ok(None) => {
                    // Invalid or expired token: same as no token.
                }
                Err(err) => {
                    tracing::warn!(
                        error = ?err,
                        "token verification unavailable, resolving as anonymous"
                    );
                }
            }
        }

        let hash = hash_address(&address, &state.config.ip_hash_salt);
        Ok(Caller {
            identity: Identity::Anonymous(hash),
            address,
        })
    }
}

/// Authenticated user extracted from a valid bearer token.
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::MissingToken)?;

        let user = state.verifier.verify(bearer.token()).await.map_err(|e| {
            tracing::error!("token verification error: {:?}", e);
            AuthError::InvalidToken
        })?;

        let user = user.ok_or(AuthError::InvalidToken)?;

        Ok(AuthUser {
            id: user.subject,
            email: user.email,
        })
    }
}

pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
        };

        let body = serde_json::json!({ "error": message });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{MockTokenVerifier, VerifiedUser};
    use crate::test_utils::TestStateBuilder;
    use axum::http::Request;

    fn parts_with_headers(headers: &[(&str, &str)]) -> Parts {
        let mut request = Request::builder();
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request.body(()).unwrap().into_parts().0
    }

    #[test]
    fn client_address_takes_first_forwarded_value() {
        let parts = parts_with_headers(&[("x-forwarded-for", "1.2.3.4, 5.6.7.8")]);
        assert_eq!(client_address(&parts.headers), "1.2.3.4");
    }

    #[test]
    fn client_address_respects_header_priority() {
        let parts = parts_with_headers(&[
            ("cf-connecting-ip", "9.9.9.9"),
            ("x-real-ip", "2.2.2.2"),
            ("x-forwarded-for", "1.1.1.1"),
        ]);
        assert_eq!(client_address(&parts.headers), "1.1.1.1");
    }

    #[test]
    fn client_address_falls_back_to_unknown() {
        let parts = parts_with_headers(&[]);
        assert_eq!(client_address(&parts.headers), "unknown");
    }

    #[test]
    fn hash_address_is_deterministic_and_salted() {
        let a = hash_address("1.2.3.4", "salt-a");
        assert_eq!(a, hash_address("1.2.3.4", "salt-a"));
        assert_ne!(a, hash_address("1.2.3.4", "salt-b"));
        assert_ne!(a, hash_address("5.6.7.8", "salt-a"));
        assert!(!a.contains("1.2.3.4"));
    }

    #[tokio::test]
    async fn valid_token_resolves_to_user_regardless_of_ip_headers() {
        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().returning(|_| {
            Ok(Some(VerifiedUser {
                subject: "u1".to_string(),
                email: "a@b.com".to_string(),
            }))
        });

        let state = TestStateBuilder::new().with_verifier(verifier).build();
        let mut parts = parts_with_headers(&[
            ("authorization", "Bearer token-123"),
            ("x-forwarded-for", "1.2.3.4"),
        ]);

        let caller = Caller::from_request_parts(&mut parts, &state).await.unwrap();

        assert_eq!(caller.identity.key(), "user:u1");
        assert!(caller.identity.is_authenticated());
        assert_eq!(caller.address, "1.2.3.4");
    }

    #[tokio::test]
    async fn no_token_resolves_to_hashed_address_identity() {
        let state = TestStateBuilder::new().build();
        let mut parts = parts_with_headers(&[("x-forwarded-for", "1.2.3.4, 5.6.7.8")]);

        let caller = Caller::from_request_parts(&mut parts, &state).await.unwrap();

        let expected = hash_address("1.2.3.4", &state.config.ip_hash_salt);
        assert_eq!(caller.identity.key(), format!("ip:{}", expected));
        assert!(!caller.identity.is_authenticated());
    }

    #[tokio::test]
    async fn invalid_token_falls_back_to_anonymous() {
        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().returning(|_| Ok(None));

        let state = TestStateBuilder::new().with_verifier(verifier).build();
        let mut parts = parts_with_headers(&[
            ("authorization", "Bearer expired-token"),
            ("x-real-ip", "2.2.2.2"),
        ]);

        let caller = Caller::from_request_parts(&mut parts, &state).await.unwrap();

        assert!(!caller.identity.is_authenticated());
        assert_eq!(caller.address, "2.2.2.2");
    }

    #[tokio::test]
    async fn verifier_outage_falls_back_to_anonymous() {
        let mut verifier = MockTokenVerifier::new();
        verifier
            .expect_verify()
            .returning(|_| Err(anyhow::anyhow!("connect timeout")));

        let state = TestStateBuilder::new().with_verifier(verifier).build();
        let mut parts = parts_with_headers(&[("authorization", "Bearer token")]);

        let caller = Caller::from_request_parts(&mut parts, &state).await.unwrap();

        assert!(!caller.identity.is_authenticated());
    }

    #[tokio::test]
    async fn auth_user_rejects_missing_token() {
        let state = TestStateBuilder::new().build();
        let mut parts = parts_with_headers(&[]);

        let result = AuthUser::from_request_parts(&mut parts, &state).await;

        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn auth_user_rejects_invalid_token() {
        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().returning(|_| Ok(None));

        let state = TestStateBuilder::new().with_verifier(verifier).build();
        let mut parts = parts_with_headers(&[("authorization", "Bearer bad")]);

        let result = AuthUser::from_request_parts(&mut parts, &state).await;

        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }
}
