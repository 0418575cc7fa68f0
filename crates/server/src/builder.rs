//! HTTP server assembly.
//!
//! `HttpServerBuilder` wires caller-supplied controllers into the fixed
//! middleware pipeline: request correlation and tracing, CORS, body
//! limits, conditional caching, custom hooks, authentication and
//! hypermedia link rewriting. The relative order of those stages does
//! not depend on registration order.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use regex::Regex;
use thiserror::Error;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::hateoas::{rewrite_response, LinkRuleRegistry};
use crate::middleware::auth::{authenticate, Authenticator};
use crate::middleware::etag::{etag_cache, EtagCache};
use crate::middleware::metrics::{init_metrics, metrics_handler, metrics_middleware};
use crate::middleware::trace_id::trace_id;
use crate::routes::docs::{self, ApiDocs};
use storage::kv::Storage;

/// Response headers exposed to browsers through CORS.
const EXPOSED_HEADERS: [&str; 3] = ["x-api-version", "x-request-id", "x-response-time"];

/// Preflight cache lifetime.
const CORS_MAX_AGE_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid listen address {addr}: {reason}")]
    Address { addr: String, reason: String },

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

type RouterHook = Box<dyn FnOnce(Router) -> Router + Send>;

pub struct HttpServerBuilder {
    host: String,
    port: u16,
    cors_origins: String,
    request_timeout: Duration,
    body_limit: usize,
    controllers: Vec<Router>,
    authenticator: Option<Authenticator>,
    link_rules: Option<LinkRuleRegistry>,
    etag_storage: Option<Arc<dyn Storage>>,
    graphql: Option<(String, Router)>,
    docs: Option<ApiDocs>,
    before_hooks: Vec<RouterHook>,
    after_hooks: Vec<RouterHook>,
    metrics: bool,
}

impl Default for HttpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpServerBuilder {
    pub fn new() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: String::new(),
            request_timeout: Duration::from_secs(30),
            body_limit: 1_048_576,
            controllers: Vec::new(),
            authenticator: None,
            link_rules: None,
            etag_storage: None,
            graphql: None,
            docs: None,
            before_hooks: Vec::new(),
            after_hooks: Vec::new(),
            metrics: false,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Comma-separated origin patterns, compiled as regular expressions.
    /// Empty allows any origin without credentials, for development.
    pub fn with_cors(mut self, origins: impl Into<String>) -> Self {
        self.cors_origins = origins.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Merge a controller router into the application.
    pub fn with_controllers(mut self, router: Router) -> Self {
        self.controllers.push(router);
        self
    }

    /// Authenticate every request through this authenticator.
    pub fn with_authenticator(mut self, authenticator: Authenticator) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Rewrite `_links` entries in response bodies through this registry.
    pub fn with_link_rules(mut self, registry: LinkRuleRegistry) -> Self {
        self.link_rules = Some(registry);
        self
    }

    /// Answer conditional GETs with 304 using ETags kept in `storage`.
    pub fn with_etag_cache(mut self, storage: Arc<dyn Storage>) -> Self {
        self.etag_storage = Some(storage);
        self
    }

    /// Mount a GraphQL router under `path`. It passes through the same
    /// pipeline as the REST controllers.
    pub fn with_graphql(mut self, path: impl Into<String>, router: Router) -> Self {
        self.graphql = Some((path.into(), router));
        self
    }

    /// Serve API documentation at the bundle's mount path.
    pub fn with_api_docs(mut self, docs: ApiDocs) -> Self {
        self.docs = Some(docs);
        self
    }

    /// Wrap the router ahead of authentication. Hooks registered first
    /// see the request first.
    pub fn with_before_hook(mut self, hook: impl FnOnce(Router) -> Router + Send + 'static) -> Self {
        self.before_hooks.push(Box::new(hook));
        self
    }

    /// Wrap the controllers directly, inside the rest of the pipeline.
    pub fn with_after_hook(mut self, hook: impl FnOnce(Router) -> Router + Send + 'static) -> Self {
        self.after_hooks.push(Box::new(hook));
        self
    }

    /// Record request metrics and expose them at `/metrics`.
    pub fn with_metrics(mut self) -> Self {
        self.metrics = true;
        self
    }

    /// Assembles the router. Layers listed last run first on the way in,
    /// so the request order is: CORS, trace, body limit, ETag cache,
    /// before hooks, authentication, link rewriting, handlers.
    pub fn build(self) -> Router {
        let cors = build_cors(&self.cors_origins);

        let mut router = Router::new();
        for controller in self.controllers {
            router = router.merge(controller);
        }
        if let Some((path, graphql)) = self.graphql {
            router = router.nest(&path, graphql);
        }
        if let Some(docs) = self.docs {
            router = router.merge(docs::router(docs));
        }
        if self.metrics {
            init_metrics();
            router = router.route("/metrics", get(metrics_handler));
        }

        for hook in self.after_hooks {
            router = hook(router);
        }

        if let Some(registry) = self.link_rules {
            router = router.layer(middleware::from_fn_with_state(
                Arc::new(registry),
                rewrite_response,
            ));
        }

        if let Some(authenticator) = self.authenticator {
            router = router.layer(middleware::from_fn_with_state(authenticator, authenticate));
        }

        // Reverse registration order so the first hook lands outermost.
        for hook in self.before_hooks.into_iter().rev() {
            router = hook(router);
        }

        if let Some(storage) = self.etag_storage {
            router = router.layer(middleware::from_fn_with_state(
                EtagCache::new(storage),
                etag_cache,
            ));
        }

        let mut router = router
            .layer(RequestBodyLimitLayer::new(self.body_limit))
            .layer(CompressionLayer::new())
            .layer(TimeoutLayer::new(self.request_timeout));

        if self.metrics {
            router = router.layer(middleware::from_fn(metrics_middleware));
        }

        router
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(trace_id))
            .layer(cors)
    }

    /// Builds the router, binds the listen address and serves until the
    /// process is stopped.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr = format!("{}:{}", self.host, self.port);
        let addr: std::net::SocketAddr = addr.parse().map_err(|e| ServerError::Address {
            addr: addr.clone(),
            reason: format!("{}", e),
        })?;

        let app = self.build();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", addr);
        axum::serve(listener, app).await?;

        Ok(())
    }
}

impl std::fmt::Debug for HttpServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServerBuilder")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("cors_origins", &self.cors_origins)
            .field("controllers", &self.controllers.len())
            .field("authenticator", &self.authenticator.is_some())
            .field("link_rules", &self.link_rules.is_some())
            .field("etag_cache", &self.etag_storage.is_some())
            .field("graphql", &self.graphql.as_ref().map(|(path, _)| path))
            .field("docs", &self.docs.is_some())
            .field("metrics", &self.metrics)
            .finish()
    }
}

/// Builds the CORS layer. Origin patterns are compiled to regular
/// expressions; a request origin is allowed when any pattern matches.
fn build_cors(origins: &str) -> CorsLayer {
    let patterns: Vec<Regex> = origins
        .split(',')
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(error) => {
                tracing::warn!(pattern, error = %error, "Skipping invalid CORS origin pattern");
                None
            }
        })
        .collect();

    let exposed: Vec<HeaderName> = EXPOSED_HEADERS
        .iter()
        .map(|name| HeaderName::from_static(name))
        .collect();

    if patterns.is_empty() {
        // Development fallback: any origin, no credentials.
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(exposed);
    }

    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        origin
            .to_str()
            .map(|origin| patterns.iter().any(|pattern| pattern.is_match(origin)))
            .unwrap_or(false)
    });

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .expose_headers(exposed)
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let builder = HttpServerBuilder::new();

        assert_eq!(builder.host, "0.0.0.0");
        assert_eq!(builder.port, 8080);
        assert_eq!(builder.body_limit, 1_048_576);
        assert!(builder.controllers.is_empty());
        assert!(!builder.metrics);
    }

    #[test]
    fn builder_is_chainable() {
        let builder = HttpServerBuilder::new()
            .with_host("127.0.0.1")
            .with_port(9000)
            .with_cors(r"https://.*\.example\.com")
            .with_metrics();

        assert_eq!(builder.host, "127.0.0.1");
        assert_eq!(builder.port, 9000);
        assert!(builder.metrics);
    }

    #[test]
    fn empty_builder_builds_a_router() {
        let _router: Router = HttpServerBuilder::new().build();
    }

    #[test]
    fn invalid_cors_patterns_are_skipped() {
        // An unclosed group is not a valid regex; the layer still builds.
        let _layer = build_cors(r"https://ok\.example\.com, (unclosed");
    }

    #[test]
    fn debug_reports_wiring() {
        let builder = HttpServerBuilder::new()
            .with_controllers(Router::new())
            .with_metrics();
        let debug = format!("{:?}", builder);

        assert!(debug.contains("controllers: 1"));
        assert!(debug.contains("metrics: true"));
    }
}
