//! Google access token verification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("Token info request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Google rejected the token with status {0}")]
    Rejected(u16),
}

/// Identity fields returned by the tokeninfo endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleUser {
    pub sub: String,
    #[serde(default)]
    pub azp: String,
    #[serde(default)]
    pub aud: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
}

/// Verifies Google access tokens and resolves the identity behind them.
/// The trait seam keeps login flows testable without network access.
#[async_trait]
pub trait GoogleVerifier: Send + Sync {
    async fn user_info(&self, access_token: &str) -> Result<GoogleUser, GoogleError>;
}

/// Production verifier backed by Google's tokeninfo endpoint.
pub struct GoogleClient {
    client: reqwest::Client,
    token_info_url: String,
}

impl GoogleClient {
    /// The access token is appended verbatim to `token_info_url`.
    pub fn new(token_info_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_info_url: token_info_url.into(),
        }
    }
}

#[async_trait]
impl GoogleVerifier for GoogleClient {
    async fn user_info(&self, access_token: &str) -> Result<GoogleUser, GoogleError> {
        let url = format!("{}{}", self.token_info_url, access_token);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Google token verification failed");
            return Err(GoogleError::Rejected(response.status().as_u16()));
        }

        Ok(response.json::<GoogleUser>().await?)
    }
}
