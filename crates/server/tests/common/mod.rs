//! Common test utilities for integration tests.

// Allow dead code in this module - these are helper utilities that may not be used
// by all integration tests but are intentionally available for future use.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
};
use serde_json::Value;
use shared::jwt::TokenCodec;

/// Symmetric key shared by all integration tests.
pub const TEST_SECRET: &str = "integration-test-secret";

/// Codec matching the tokens produced by `sign`.
pub fn test_codec() -> TokenCodec {
    TokenCodec::from_secret(TEST_SECRET)
}

/// Signs a token the test authenticator accepts.
pub fn sign(claims: &Value, expires_at: i64) -> String {
    test_codec()
        .sign(claims, expires_at)
        .expect("Failed to sign test token")
}

/// Expiry timestamp comfortably in the future.
pub fn future_expiry() -> i64 {
    TokenCodec::expires_in(3600)
}

/// GET request with optional extra headers.
pub fn get_request(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).expect("Failed to build request")
}

/// POST request with a JSON body and optional extra headers.
pub fn post_json(uri: &str, body: Value, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

/// Reads a response body as JSON, `Value::Null` when empty or not JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Reads a response body as raw bytes.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body")
        .to_vec()
}

/// Pulls a cookie value out of a Set-Cookie header string.
pub fn cookie_value(set_cookie: &str, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    let rest = set_cookie.strip_prefix(&prefix)?;
    Some(rest.split(';').next().unwrap_or(rest).to_string())
}
