//! Google Cloud Storage backend.
//!
//! Objects are never proxied: callers receive V4-style signed URLs
//! (GOOG4-HMAC-SHA256 over a canonical request, signed with an
//! interoperability HMAC key) that expire after the configured TTL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use shared::crypto::sha256_hex;

use super::{FileStorage, FileStorageError};

type HmacSha256 = Hmac<Sha256>;

const SIGNING_ALGORITHM: &str = "GOOG4-HMAC-SHA256";
const SIGNING_LOCATION: &str = "auto";
const SIGNING_SERVICE: &str = "storage";
const SIGNING_TERMINATOR: &str = "goog4_request";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Settings for the Google Cloud backend.
#[derive(Clone, Deserialize)]
pub struct GoogleCloudConfig {
    pub bucket: String,

    /// HMAC interoperability access id.
    pub access_id: String,

    /// HMAC interoperability secret.
    pub secret: String,

    /// How long signed URLs stay valid.
    #[serde(default = "default_url_ttl")]
    pub url_ttl_secs: u64,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Object served when a requested object does not exist.
    pub not_found_path: String,
}

fn default_url_ttl() -> u64 {
    900
}

fn default_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

impl std::fmt::Debug for GoogleCloudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCloudConfig")
            .field("bucket", &self.bucket)
            .field("access_id", &self.access_id)
            .field("secret", &"[REDACTED]")
            .field("url_ttl_secs", &self.url_ttl_secs)
            .field("endpoint", &self.endpoint)
            .field("not_found_path", &self.not_found_path)
            .finish()
    }
}

/// Cloud backend resolving logical paths to signed, time-limited URLs.
pub struct GoogleCloudStorage {
    config: GoogleCloudConfig,
    client: reqwest::Client,
}

impl GoogleCloudStorage {
    pub fn new(config: GoogleCloudConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn host(&self) -> &str {
        self.config
            .endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://")
    }

    /// Builds a V4 signed URL for one object and HTTP method.
    fn signed_url(&self, method: &str, object: &str) -> Result<String, FileStorageError> {
        self.signed_url_at(method, object, Utc::now())
    }

    fn signed_url_at(
        &self,
        method: &str,
        object: &str,
        now: DateTime<Utc>,
    ) -> Result<String, FileStorageError> {
        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!(
            "{}/{}/{}/{}",
            date, SIGNING_LOCATION, SIGNING_SERVICE, SIGNING_TERMINATOR
        );
        let credential = format!("{}/{}", self.config.access_id, scope);
        let resource = format!("/{}/{}", self.config.bucket, encode_path(object));

        // Query parameters must stay sorted by name.
        let query = format!(
            "X-Goog-Algorithm={}&X-Goog-Credential={}&X-Goog-Date={}&X-Goog-Expires={}&X-Goog-SignedHeaders=host",
            SIGNING_ALGORITHM,
            encode_component(&credential),
            timestamp,
            self.config.url_ttl_secs,
        );

        let canonical_request = format!(
            "{}\n{}\n{}\nhost:{}\n\nhost\n{}",
            method,
            resource,
            query,
            self.host(),
            UNSIGNED_PAYLOAD
        );

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            SIGNING_ALGORITHM,
            timestamp,
            scope,
            sha256_hex(&canonical_request)
        );

        let mut key = hmac_sha256(
            format!("GOOG4{}", self.config.secret).as_bytes(),
            date.as_bytes(),
        )?;
        for part in [SIGNING_LOCATION, SIGNING_SERVICE, SIGNING_TERMINATOR] {
            key = hmac_sha256(&key, part.as_bytes())?;
        }
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

        Ok(format!(
            "{}{}?{}&X-Goog-Signature={}",
            self.config.endpoint, resource, query, signature
        ))
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, FileStorageError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| FileStorageError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Percent-encodes a query component (RFC 3986 unreserved set).
fn encode_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

/// Percent-encodes an object path, keeping segment separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(encode_component)
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl FileStorage for GoogleCloudStorage {
    async fn get_file(&self, path: &str) -> Result<String, FileStorageError> {
        // Existence probe through a signed HEAD; a missing object falls
        // back to the configured not-found object. Other upstream failures
        // propagate.
        let probe = self.signed_url("HEAD", path)?;
        let response = self.client.head(&probe).send().await?;

        if response.status().is_success() {
            return self.signed_url("GET", path);
        }
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(path, "Object not found, serving fallback");
            return self.signed_url("GET", &self.config.not_found_path);
        }

        Err(FileStorageError::Upstream {
            status: response.status().as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }

    async fn save_file(&self, path: &str, content: &[u8]) -> Result<(), FileStorageError> {
        let url = self.signed_url("PUT", path)?;
        let response = self.client.put(&url).body(content.to_vec()).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(path, status, "Object upload failed");
            return Err(FileStorageError::Upstream { status, message });
        }

        tracing::debug!(path, bytes = content.len(), "Object uploaded");
        Ok(())
    }
}
