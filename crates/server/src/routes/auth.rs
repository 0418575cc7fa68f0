//! Login, refresh and logout endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::ApiError;
use crate::services::cookies::CookieHelper;
use crate::services::login::LoginService;

#[derive(Clone)]
pub struct AuthState {
    pub login: Arc<LoginService>,
    pub cookies: Arc<CookieHelper>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "accessToken must not be empty"))]
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: Value,
    pub token: String,
}

/// Builds the auth router. The server builder mounts it under the
/// configured prefix, `/auth` by default.
pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .with_state(state)
}

/// POST /login
///
/// Exchanges a Google access token for a user payload and signed access
/// token. The refresh token travels only in an httpOnly cookie.
async fn login(
    State(state): State<AuthState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate()?;

    let outcome = state.login.login(&request.access_token).await?;

    let mut headers = HeaderMap::new();
    state.cookies.add_refresh_cookie(&mut headers, &outcome.refresh_token);

    Ok((
        headers,
        Json(LoginResponse {
            user: outcome.user,
            token: outcome.token,
        }),
    ))
}

/// POST /refresh
///
/// Mints a fresh access token from the refresh token cookie.
async fn refresh(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let refresh_token = state
        .cookies
        .extract_refresh_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing refresh token"))?
        .to_string();

    let outcome = state.login.refresh(&refresh_token).await?;

    Ok(Json(LoginResponse {
        user: outcome.user,
        token: outcome.token,
    }))
}

/// POST /logout
///
/// Clears the refresh token cookie and drops the stored record.
async fn logout(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = state.cookies.extract_refresh_token(&headers) {
        state.login.logout(token).await?;
    }

    let mut response_headers = HeaderMap::new();
    state.cookies.add_clear_cookie(&mut response_headers);

    Ok((response_headers, StatusCode::NO_CONTENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_deserializes_camel_case() {
        let request: LoginRequest =
            serde_json::from_str(r#"{"accessToken":"ya29.token"}"#).unwrap();
        assert_eq!(request.access_token, "ya29.token");
    }

    #[test]
    fn empty_access_token_fails_validation() {
        let request = LoginRequest {
            access_token: String::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn login_response_serializes_camel_case() {
        let response = LoginResponse {
            user: serde_json::json!({ "id": 1 }),
            token: "jwt".to_string(),
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["user"]["id"], 1);
        assert_eq!(value["token"], "jwt");
    }
}
