//! Request correlation middleware.
//!
//! Accepts or generates a per-request ID, spans the request with it for
//! log correlation and reports the ID and elapsed time on the response.

use axum::{
    body::Body,
    http::{header::HeaderName, Extensions, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Header carrying the request ID in both directions.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Header reporting handler latency on the response.
pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

/// Request ID stored in request extensions.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Reuses the inbound `X-Request-ID` header or generates a UUID v4, then
/// stores the ID in request extensions and echoes it on the response.
pub async fn trace_id(mut req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let _guard = span.enter();
    let start = std::time::Instant::now();

    let mut response = next.run(req).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status().as_u16();

    // The span already carries the request ID.
    tracing::info!(status, duration_ms, "Request completed");

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-request-id"), header_value);
    }
    if let Ok(header_value) = HeaderValue::from_str(&format!("{}ms", duration_ms)) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(RESPONSE_TIME_HEADER), header_value);
    }

    response
}

/// Reads the request ID out of extensions, with a placeholder fallback.
pub fn get_request_id(extensions: &Extensions) -> String {
    extensions
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_else(|| "unknown".to_string())
}
