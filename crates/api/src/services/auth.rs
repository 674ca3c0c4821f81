//! Bearer-token verification against the auth provider.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// A verified caller. Both claims are required; a token missing either is
/// treated as invalid.
#[derive(Debug, Clone)]
pub struct VerifiedUser {
    pub subject: String,
    pub email: String,
}

/// Token verification trait.
///
/// `Ok(None)` covers every unusable token - malformed, expired, revoked,
/// missing claims. `Err` is reserved for transport failures; callers decide
/// whether those degrade to anonymous or reject.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Option<VerifiedUser>>;
}

/// HTTP implementation calling the auth provider's user-info endpoint.
#[derive(Clone)]
pub struct HttpTokenVerifier {
    http: reqwest::Client,
    verify_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl HttpTokenVerifier {
    pub fn new(verify_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()?;

        Ok(Self {
            http,
            verify_url: verify_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl TokenVerifier for HttpTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Option<VerifiedUser>> {
        let response = self
            .http
            .get(&self.verify_url)
            .header("Authorization", format!("Bearer {}", token))
            .header("apikey", &self.api_key)
            .send()
            .await?;

        // The provider answers 401/403 for expired or malformed tokens.
        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Ok(None);
        }

        if !response.status().is_success() {
            anyhow::bail!("auth provider returned {}", response.status());
        }

        let info: UserInfoResponse = response.json().await?;

        match info.email {
            Some(email) if !email.is_empty() => Ok(Some(VerifiedUser {
                subject: info.id,
                email,
            })),
            _ => Ok(None),
        }
    }
}
