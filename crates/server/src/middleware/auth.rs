//! JWT authentication middleware.
//!
//! Pulls a bearer token from the Authorization header or a configured
//! cookie, verifies it through the token codec and attaches the decoded
//! identity plus policy-derived roles to the request extensions.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::services::cookies::extract_cookie;
use shared::jwt::TokenCodec;

/// Header naming the tenant a request acts within.
pub const TENANT_HEADER: &str = "x-api-tenant";

/// Synthetic role granted to tenant admins.
pub const ADMIN_ROLE: &str = "admin";

/// How a decoded token maps to roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolePolicy {
    /// The top-level `roles` claim is used directly.
    Flat,
    /// Roles come from the `tenant` claim; a top-level `isAdmin` flag
    /// grants the synthetic admin role.
    SingleTenant,
    /// Roles come from the entry of the `tenants` claim selected by the
    /// tenant header. A sole tenant is used when the header names none.
    MultiTenant,
}

/// What happens to requests without a usable token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Reject: missing token 401, failed verification 403, expired 419.
    #[default]
    Required,
    /// Log the failure and continue without an identity.
    Optional,
}

/// Authentication settings handed to the server builder.
#[derive(Clone)]
pub struct Authenticator {
    codec: Arc<TokenCodec>,
    policy: RolePolicy,
    mode: AuthMode,
    cookie_name: Option<String>,
}

impl Authenticator {
    pub fn new(codec: TokenCodec, policy: RolePolicy) -> Self {
        Self {
            codec: Arc::new(codec),
            policy,
            mode: AuthMode::Required,
            cookie_name: None,
        }
    }

    pub fn with_mode(mut self, mode: AuthMode) -> Self {
        self.mode = mode;
        self
    }

    /// Also search this cookie for tokens. The Authorization header wins
    /// when both are present.
    pub fn with_cookie(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = Some(name.into());
        self
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("policy", &self.policy)
            .field("mode", &self.mode)
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

/// Verified identity stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    /// The decoded token payload.
    pub claims: Value,
    /// Roles derived for this request per the configured policy.
    pub roles: Vec<String>,
}

impl AuthIdentity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TenantMembership {
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    is_admin: bool,
}

/// Middleware entry point wired by the server builder.
pub async fn authenticate(
    State(auth): State<Authenticator>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = extract_token(req.headers(), auth.cookie_name.as_deref());

    let Some(token) = token else {
        return match auth.mode {
            AuthMode::Required => {
                ApiError::unauthorized("Authentication required").into_response()
            }
            AuthMode::Optional => next.run(req).await,
        };
    };

    match auth.codec.verify::<Value>(&token) {
        Ok(claims) => {
            let roles = derive_roles(auth.policy, &claims, req.headers());
            req.extensions_mut().insert(AuthIdentity { claims, roles });
            next.run(req).await
        }
        Err(error) => {
            tracing::warn!(error = %error, "Token verification failed");
            metrics::counter!("auth_rejections_total").increment(1);
            match auth.mode {
                AuthMode::Required => ApiError::from(error).into_response(),
                AuthMode::Optional => next.run(req).await,
            }
        }
    }
}

fn extract_token(headers: &HeaderMap, cookie_name: Option<&str>) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);
    if bearer.is_some() {
        return bearer;
    }

    cookie_name.and_then(|name| extract_cookie(headers, name).map(str::to_string))
}

/// Derives the role set for a decoded token under the given policy.
fn derive_roles(policy: RolePolicy, claims: &Value, headers: &HeaderMap) -> Vec<String> {
    match policy {
        RolePolicy::Flat => claims
            .get("roles")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default(),

        RolePolicy::SingleTenant => {
            let membership: TenantMembership = claims
                .get("tenant")
                .cloned()
                .and_then(|value| serde_json::from_value(value).ok())
                .unwrap_or_default();
            let is_admin = claims
                .get("isAdmin")
                .and_then(Value::as_bool)
                .unwrap_or(false);

            let mut roles = membership.roles;
            if is_admin {
                roles.push(ADMIN_ROLE.to_string());
            }
            roles
        }

        RolePolicy::MultiTenant => {
            let tenants: HashMap<String, TenantMembership> = claims
                .get("tenants")
                .cloned()
                .and_then(|value| serde_json::from_value(value).ok())
                .unwrap_or_default();
            let requested = headers
                .get(TENANT_HEADER)
                .and_then(|value| value.to_str().ok());

            let membership = match requested.and_then(|id| tenants.get(id)) {
                Some(membership) => Some(membership),
                // A single membership is unambiguous without the header.
                None if tenants.len() == 1 => tenants.values().next(),
                None => None,
            };

            match membership {
                Some(membership) => {
                    let mut roles = membership.roles.clone();
                    if membership.is_admin {
                        roles.push(ADMIN_ROLE.to_string());
                    }
                    roles
                }
                None => Vec::new(),
            }
        }
    }
}
