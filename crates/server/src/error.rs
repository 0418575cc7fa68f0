//! API error taxonomy and response mapping.
//!
//! Every error that escapes a handler is rendered as a JSON body of the
//! form `{"error": "...", "location": "..."}` where `location` is only
//! present on unauthorized errors that carry a redirect target. Internal
//! errors are logged with their cause and surfaced with a masked message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::hateoas::LinkError;
use crate::services::login::AuthFlowError;
use persistence::DbError;
use shared::jwt::TokenError;
use storage::file::FileStorageError;
use storage::kv::StorageError;

/// Status code for expired authentication. Not in the IANA registry but
/// conventional for session timeouts.
pub const AUTHENTICATION_TIMEOUT: u16 = 419;

/// Message clients see in place of internal error details.
const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        /// Redirect target surfaced to the client, typically a login page.
        location: Option<String>,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication timeout")]
    AuthenticationTimeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            message: message.into(),
            location: None,
        }
    }

    pub fn unauthorized_redirect(message: impl Into<String>, location: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            message: message.into(),
            location: Some(location.into()),
        }
    }
}

/// Wire shape of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, location) = match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message, None),
            ApiError::Unauthorized { message, location } => {
                (StatusCode::UNAUTHORIZED, message, location)
            }
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message, None),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message, None),
            ApiError::AuthenticationTimeout => (
                StatusCode::from_u16(AUTHENTICATION_TIMEOUT).unwrap_or(StatusCode::UNAUTHORIZED),
                "Authentication timeout".to_string(),
                None,
            ),
            ApiError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: message,
            location,
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "invalid value".to_string());
                    format!("{}: {}", field, message)
                })
            })
            .collect();

        ApiError::Validation(details.join("; "))
    }
}

impl From<TokenError> for ApiError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Expired => ApiError::AuthenticationTimeout,
            TokenError::InvalidSignature
            | TokenError::DisallowedAlgorithm
            | TokenError::Malformed(_) => ApiError::Forbidden("Failed to verify token".to_string()),
            TokenError::Signing(_) | TokenError::NonObjectPayload | TokenError::InvalidKey(_) => {
                ApiError::Internal(error.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        ApiError::Internal(error.to_string())
    }
}

impl From<FileStorageError> for ApiError {
    fn from(error: FileStorageError) -> Self {
        ApiError::Internal(error.to_string())
    }
}

impl From<LinkError> for ApiError {
    fn from(error: LinkError) -> Self {
        ApiError::Internal(error.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::Sqlx(sqlx::Error::RowNotFound) => {
                ApiError::NotFound("Resource not found".to_string())
            }
            DbError::Page(error) => ApiError::Validation(error.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthFlowError> for ApiError {
    fn from(error: AuthFlowError) -> Self {
        match error {
            AuthFlowError::GoogleRejected(_) | AuthFlowError::UnknownUser => {
                ApiError::unauthorized("Unable to authenticate with google")
            }
            AuthFlowError::UnknownRefreshToken => {
                ApiError::unauthorized("Refresh token is unknown or expired")
            }
            AuthFlowError::Token(error) => ApiError::from(error),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn validation_error_display() {
        let err = ApiError::Validation("name is required".to_string());
        assert_eq!(err.to_string(), "Validation error: name is required");
    }

    #[test]
    fn unauthorized_error_display() {
        let err = ApiError::unauthorized("missing token");
        assert_eq!(err.to_string(), "Unauthorized: missing token");
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiError::Validation("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::unauthorized("x").into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("x".into()).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::AuthenticationTimeout.into_response().status().as_u16(),
            419
        );
        assert_eq!(
            ApiError::Internal("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn error_body_carries_message() {
        let response = ApiError::NotFound("No such device".to_string()).into_response();
        let body = body_json(response).await;

        assert_eq!(body["error"], "No such device");
        assert!(body.get("location").is_none());
    }

    #[tokio::test]
    async fn unauthorized_body_carries_location() {
        let response =
            ApiError::unauthorized_redirect("login required", "/login").into_response();
        let body = body_json(response).await;

        assert_eq!(body["error"], "login required");
        assert_eq!(body["location"], "/login");
    }

    #[tokio::test]
    async fn internal_error_is_masked() {
        let response = ApiError::Internal("connection pool exhausted".to_string()).into_response();
        let body = body_json(response).await;

        assert_eq!(body["error"], "Internal Server Error");
    }

    #[test]
    fn expired_token_maps_to_timeout() {
        let err = ApiError::from(TokenError::Expired);
        assert!(matches!(err, ApiError::AuthenticationTimeout));
    }

    #[test]
    fn bad_signature_maps_to_forbidden() {
        let err = ApiError::from(TokenError::InvalidSignature);
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn signing_failure_maps_to_internal() {
        let err = ApiError::from(TokenError::Signing("bad key".to_string()));
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = ApiError::from(DbError::Sqlx(sqlx::Error::RowNotFound));
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn validation_errors_are_flattened() {
        use validator::Validate;

        #[derive(Validate)]
        struct Payload {
            #[validate(length(min = 1, message = "must not be empty"))]
            name: String,
        }

        let payload = Payload {
            name: String::new(),
        };
        let err = ApiError::from(payload.validate().unwrap_err());

        match err {
            ApiError::Validation(message) => {
                assert!(message.contains("name"));
                assert!(message.contains("must not be empty"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
