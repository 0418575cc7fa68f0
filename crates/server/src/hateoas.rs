//! Hypermedia link rules and response rewriting.
//!
//! Handlers place linkable entities under a reserved `_links` key; on the
//! way out, the rewriter walks the JSON body, looks up the rule registered
//! for each entity's tag and replaces the entity with the produced links.
//! Entries that already hold links are left untouched, which makes the
//! rewrite idempotent.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::ApiError;

/// Reserved key mapping link names to linkable entities.
pub const LINKS_KEY: &str = "_links";

/// Reserved key carrying an entity's registry tag in serialized form.
pub const TAG_KEY: &str = "_tag";

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("No link rule registered for tag '{tag}'")]
    UnresolvedRule { tag: String },

    #[error("Entity under '_links' carries no '_tag' key: {0}")]
    MissingTag(Value),

    #[error("Linkable entity did not serialize to an object: {0}")]
    NonObjectEntity(Value),

    #[error("Failed to serialize link output: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A hypermedia link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl Link {
    pub fn new(rel: impl Into<String>, href: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            method: method.into(),
            target: None,
        }
    }

    /// Shorthand for the common GET link.
    pub fn get(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self::new(rel, href, "GET")
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// What a link rule produces for one entity.
#[derive(Debug, Clone)]
pub enum LinkOutput {
    Single(Link),
    Many(Vec<Link>),
}

impl LinkOutput {
    fn to_value(&self) -> Result<Value, LinkError> {
        let value = match self {
            LinkOutput::Single(link) => serde_json::to_value(link)?,
            LinkOutput::Many(links) => serde_json::to_value(links)?,
        };
        Ok(value)
    }
}

impl From<Link> for LinkOutput {
    fn from(link: Link) -> Self {
        LinkOutput::Single(link)
    }
}

impl From<Vec<Link>> for LinkOutput {
    fn from(links: Vec<Link>) -> Self {
        LinkOutput::Many(links)
    }
}

/// Request-scoped context handed to link rules.
#[derive(Debug, Clone, Default)]
pub struct LinkContext {
    /// Scheme and authority of the inbound request, e.g. `https://api.example.com`.
    pub base_url: Option<String>,
}

impl LinkContext {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
        }
    }

    pub fn from_request(request: &Request<Body>) -> Self {
        let scheme = request
            .headers()
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("http");
        let base_url = request
            .headers()
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(|host| format!("{}://{}", scheme, host));
        Self { base_url }
    }

    /// Prefixes `path` with the request's base URL when one is known.
    pub fn href(&self, path: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}{}", base, path),
            None => path.to_string(),
        }
    }
}

/// Marks a type as linkable. Implementations pick a unique tag that the
/// registry resolves to a rule at response time.
pub trait Linkable: Serialize {
    /// Registry tag embedded in the entity's serialized form.
    const TAG: &'static str;
}

/// Serializes a linkable entity with its tag embedded, ready to sit under
/// a `_links` key.
pub fn tagged<T: Linkable>(entity: &T) -> Result<Value, LinkError> {
    let mut value = serde_json::to_value(entity)?;
    match value.as_object_mut() {
        Some(map) => {
            map.insert(TAG_KEY.to_string(), Value::String(T::TAG.to_string()));
            Ok(value)
        }
        None => Err(LinkError::NonObjectEntity(value)),
    }
}

type LinkRule = Arc<dyn Fn(&Value, &LinkContext) -> LinkOutput + Send + Sync>;

/// Maps entity tags to link rules. Built once at server setup.
#[derive(Clone, Default)]
pub struct LinkRuleRegistry {
    rules: HashMap<&'static str, LinkRule>,
}

impl LinkRuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the rule for `T`, replacing any previous rule for its tag.
    pub fn register<T, F>(mut self, rule: F) -> Self
    where
        T: Linkable,
        F: Fn(&Value, &LinkContext) -> LinkOutput + Send + Sync + 'static,
    {
        self.rules.insert(T::TAG, Arc::new(rule));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Rewrites every `_links` entry in `body`, recursing through nested
    /// objects and arrays.
    pub fn rewrite(&self, body: &mut Value, ctx: &LinkContext) -> Result<(), LinkError> {
        match body {
            Value::Object(map) => {
                for (key, value) in map.iter_mut() {
                    if key == LINKS_KEY {
                        self.rewrite_links(value, ctx)?;
                    } else {
                        self.rewrite(value, ctx)?;
                    }
                }
                Ok(())
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.rewrite(item, ctx)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn rewrite_links(&self, links: &mut Value, ctx: &LinkContext) -> Result<(), LinkError> {
        let Some(entries) = links.as_object_mut() else {
            return Ok(());
        };

        for entry in entries.values_mut() {
            // Already-resolved links pass through unchanged.
            if is_link(entry) || is_link_array(entry) {
                continue;
            }

            let tag = match entry.get(TAG_KEY).and_then(Value::as_str) {
                Some(tag) => tag.to_string(),
                None => return Err(LinkError::MissingTag(entry.clone())),
            };

            let rule = self
                .rules
                .get(tag.as_str())
                .ok_or(LinkError::UnresolvedRule { tag })?;

            let replacement = rule(entry, ctx).to_value()?;
            *entry = replacement;
        }

        Ok(())
    }
}

impl std::fmt::Debug for LinkRuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkRuleRegistry")
            .field("tags", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn is_link(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.contains_key("rel") && map.contains_key("href") && map.contains_key("method"))
}

fn is_link_array(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| !items.is_empty() && items.iter().all(is_link))
}

/// Middleware buffering successful JSON responses and rewriting their
/// `_links` entries through the registry.
pub async fn rewrite_response(
    State(registry): State<Arc<LinkRuleRegistry>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = LinkContext::from_request(&request);
    let response = next.run(request).await;

    if !response.status().is_success() || !is_json(&response) {
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

    let mut value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        // Not a JSON document after all; pass it through untouched.
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };

    if let Err(error) = registry.rewrite(&mut value, &ctx) {
        return ApiError::from(error).into_response();
    }

    match serde_json::to_vec(&value) {
        Ok(rewritten) => {
            // The rewrite changed the body length; let hyper recompute it.
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(rewritten))
        }
        Err(error) => {
            ApiError::Internal(format!("Failed to serialize rewritten body: {}", error))
                .into_response()
        }
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("application/json"))
}
