//! Conditional GET caching backed by the key-value storage facade.
//!
//! Successful GET responses are hashed into a weak ETag that is stored
//! per request path. A later request presenting the stored value in
//! If-None-Match is answered with 304 before it reaches the handlers.
//! Storage trouble degrades to plain pass-through.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use shared::crypto::sha256_hex_bytes;
use storage::kv::Storage;

/// ETag state handed to the server builder.
#[derive(Clone)]
pub struct EtagCache {
    storage: Arc<dyn Storage>,
}

impl EtagCache {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn key(path: &str) -> String {
        format!("etag:{}", path)
    }
}

/// Middleware entry point wired by the server builder.
pub async fn etag_cache(
    State(cache): State<EtagCache>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() != Method::GET {
        return next.run(req).await;
    }

    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let key = EtagCache::key(&path);

    let candidate = req
        .headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let stored = match cache.storage.get(&key).await {
        Ok(value) => value,
        Err(error) => {
            tracing::debug!(error = %error, "ETag lookup failed");
            None
        }
    };

    if let (Some(candidate), Some(stored)) = (candidate.as_deref(), stored.as_deref()) {
        if candidate == stored {
            metrics::counter!("etag_cache_hits_total").increment(1);
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            if let Ok(value) = HeaderValue::from_str(stored) {
                response.headers_mut().insert(header::ETAG, value);
            }
            return response;
        }
    }

    let response = next.run(req).await;
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            return ApiError::Internal(format!("Failed to buffer response body: {}", error))
                .into_response()
        }
    };

    if bytes.is_empty() {
        return Response::from_parts(parts, Body::from(bytes));
    }

    let etag = weak_etag(&bytes);
    if let Ok(value) = HeaderValue::from_str(&etag) {
        parts.headers.insert(header::ETAG, value);
    }
    if let Err(error) = cache.storage.set(&key, &etag).await {
        tracing::debug!(error = %error, "ETag store failed");
    }

    Response::from_parts(parts, Body::from(bytes))
}

/// Weak validator over the body bytes, sha-256 truncated to 128 bits.
fn weak_etag(bytes: &[u8]) -> String {
    let digest = sha256_hex_bytes(bytes);
    format!("W/\"{}\"", &digest[..32])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_etag_is_stable() {
        assert_eq!(weak_etag(b"payload"), weak_etag(b"payload"));
        assert_ne!(weak_etag(b"payload"), weak_etag(b"other"));
    }

    #[test]
    fn weak_etag_has_validator_shape() {
        let etag = weak_etag(b"payload");
        assert!(etag.starts_with("W/\""));
        assert!(etag.ends_with('"'));
        // 32 hex chars plus the W/"..." wrapper.
        assert_eq!(etag.len(), 32 + 4);
    }

    #[test]
    fn cache_keys_are_namespaced_by_path() {
        assert_eq!(EtagCache::key("/devices?page=2"), "etag:/devices?page=2");
        assert_ne!(EtagCache::key("/a"), EtagCache::key("/b"));
    }
}
