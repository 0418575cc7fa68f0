//! JWT token codec.
//!
//! Signs arbitrary JSON-object payloads with an expiration claim and
//! verifies them against an algorithm allow-list. RS256 (RSA-SHA256) keys
//! are the production default; HMAC secrets are supported for symmetric
//! deployments and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Error type for token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Token payload must serialize to a JSON object")]
    NonObjectPayload,

    #[error("Token has expired")]
    Expired,

    #[error("Token signature does not match")]
    InvalidSignature,

    #[error("Token algorithm is not allowed")]
    DisallowedAlgorithm,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Malformed token: {0}")]
    Malformed(String),
}

/// Claim merged into every signed payload (expiration, Unix timestamp).
const EXP_CLAIM: &str = "exp";

/// Default leeway in seconds for clock skew tolerance
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

/// Signs and verifies compact tokens.
///
/// The codec carries the signing algorithm and the allow-list used during
/// verification; a token signed with an algorithm outside the allow-list is
/// rejected regardless of its signature.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    allowed_algorithms: Vec<Algorithm>,
    leeway_secs: u64,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .field("leeway_secs", &self.leeway_secs)
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl TokenCodec {
    /// Creates a codec from an RSA key pair in PEM format.
    ///
    /// # Arguments
    /// * `private_key_pem` - RSA private key in PEM format
    /// * `public_key_pem` - RSA public key in PEM format
    /// * `algorithm` - RSA-family algorithm (RS256/RS384/RS512, PS*)
    pub fn from_rsa_pem(
        private_key_pem: &str,
        public_key_pem: &str,
        algorithm: Algorithm,
    ) -> Result<Self, TokenError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| TokenError::InvalidKey(format!("Invalid private key: {}", e)))?;

        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| TokenError::InvalidKey(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            algorithm,
            allowed_algorithms: vec![algorithm],
            leeway_secs: DEFAULT_LEEWAY_SECS,
        })
    }

    /// Creates a codec from a shared HMAC secret (HS256).
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::HS256,
            allowed_algorithms: vec![Algorithm::HS256],
            leeway_secs: DEFAULT_LEEWAY_SECS,
        }
    }

    /// Replaces the verification allow-list.
    pub fn with_allowed_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    /// Replaces the clock-skew leeway.
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// Signs a payload, merging the `exp` claim into its serialized form.
    ///
    /// The payload must serialize to a JSON object; anything else cannot
    /// carry the expiration claim and is rejected.
    pub fn sign<T: Serialize>(&self, payload: &T, expires_at: i64) -> Result<String, TokenError> {
        let mut claims =
            serde_json::to_value(payload).map_err(|e| TokenError::Signing(e.to_string()))?;
        claims
            .as_object_mut()
            .ok_or(TokenError::NonObjectPayload)?
            .insert(EXP_CLAIM.to_string(), serde_json::Value::from(expires_at));

        let header = Header::new(self.algorithm);
        encode(&header, &claims, &self.encoding_key).map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verifies a token and returns the decoded payload.
    ///
    /// Checks the signature, the algorithm allow-list and the expiration
    /// claim (with leeway). The returned value is the original payload plus
    /// the `exp` claim.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.algorithms = self.allowed_algorithms.clone();
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;

        let token_data =
            decode::<T>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                    TokenError::DisallowedAlgorithm
                }
                ErrorKind::InvalidKeyFormat
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::InvalidEcdsaKey => TokenError::InvalidKey(e.to_string()),
                _ => TokenError::Malformed(e.to_string()),
            })?;

        Ok(token_data.claims)
    }

    /// Computes an expiration timestamp `duration_secs` from now.
    pub fn expires_in(duration_secs: i64) -> i64 {
        (Utc::now() + Duration::seconds(duration_secs)).timestamp()
    }
}
