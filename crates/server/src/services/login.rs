//! Google-backed login flow.
//!
//! Login verifies the Google access token, resolves a deployment user,
//! signs an access token and parks a refresh token record in the storage
//! facade. The refresh token itself is the content hash of the user
//! payload; the stored record expires with the configured TTL.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::google::{GoogleError, GoogleUser, GoogleVerifier};
use shared::crypto::{content_hash, HashError};
use shared::jwt::{TokenCodec, TokenError};
use storage::kv::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum AuthFlowError {
    #[error("Unable to authenticate with google")]
    GoogleRejected(#[source] GoogleError),

    #[error("No user registered for this google account")]
    UnknownUser,

    #[error("Refresh token is unknown or expired")]
    UnknownRefreshToken,

    #[error("User lookup failed: {0}")]
    Lookup(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("Failed to serialize user payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Resolves the deployment's user for a verified Google identity.
///
/// Returning `None` means the Google account has no user here and the
/// login is rejected.
#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn find_by_google(&self, google_user: &GoogleUser) -> Result<Option<Value>, AuthFlowError>;
}

/// Outcome of a successful login or refresh.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// User payload embedded in the access token.
    pub user: Value,
    /// Signed access token.
    pub token: String,
    /// Refresh token to park in the httpOnly cookie.
    pub refresh_token: String,
}

pub struct LoginService {
    google: Arc<dyn GoogleVerifier>,
    users: Arc<dyn UserLookup>,
    codec: Arc<TokenCodec>,
    storage: Arc<dyn Storage>,
    token_duration_secs: i64,
    refresh_ttl_secs: u64,
}

impl LoginService {
    pub fn new(
        google: Arc<dyn GoogleVerifier>,
        users: Arc<dyn UserLookup>,
        codec: Arc<TokenCodec>,
        storage: Arc<dyn Storage>,
        token_duration_secs: i64,
        refresh_ttl_secs: u64,
    ) -> Self {
        Self {
            google,
            users,
            codec,
            storage,
            token_duration_secs,
            refresh_ttl_secs,
        }
    }

    /// Exchanges a Google access token for a signed token pair.
    pub async fn login(&self, access_token: &str) -> Result<LoginOutcome, AuthFlowError> {
        let google_user = self
            .google
            .user_info(access_token)
            .await
            .map_err(AuthFlowError::GoogleRejected)?;

        let user = self
            .users
            .find_by_google(&google_user)
            .await?
            .ok_or(AuthFlowError::UnknownUser)?;

        let token = self
            .codec
            .sign(&user, TokenCodec::expires_in(self.token_duration_secs))?;

        let refresh_token = content_hash(&user)?;
        self.storage
            .set(&refresh_token, &serde_json::to_string(&user)?)
            .await?;
        self.storage
            .expire_in(&refresh_token, self.refresh_ttl_secs)
            .await?;

        metrics::counter!("logins_total").increment(1);
        tracing::info!(sub = %google_user.sub, "User logged in");

        Ok(LoginOutcome {
            user,
            token,
            refresh_token,
        })
    }

    /// Mints a fresh access token from a stored refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<LoginOutcome, AuthFlowError> {
        let serialized = self
            .storage
            .get(refresh_token)
            .await?
            .ok_or(AuthFlowError::UnknownRefreshToken)?;
        let user: Value = serde_json::from_str(&serialized)?;

        let token = self
            .codec
            .sign(&user, TokenCodec::expires_in(self.token_duration_secs))?;

        // Sliding expiry: using the refresh token keeps it alive.
        self.storage
            .expire_in(refresh_token, self.refresh_ttl_secs)
            .await?;

        Ok(LoginOutcome {
            user,
            token,
            refresh_token: refresh_token.to_string(),
        })
    }

    /// Drops the refresh token record. Unknown tokens are a no-op.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthFlowError> {
        self.storage.delete(refresh_token).await?;
        Ok(())
    }
}
