use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::auth::{AuthError, GateError};
use crate::keeper::KeeperError;
use crate::models::{EntityDecodeError, UnknownEntityKind};

#[derive(Debug)]
pub enum ApiError {
    // Auth Errors
    Unauthenticated(&'static str),
    InvalidCredentials,
    IdentityMissing,

    // Model Errors
    BadRequest(String),
    Conflict(String),
    NotFound(String),

    // Generic; details are logged, never sent
    Internal,
}

pub type Result<T> = core::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg.to_string()),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid email or password".to_string(),
            ),
            ApiError::IdentityMissing => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "identity missing from request".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "message": error_message
            }
        }));

        (status, body).into_response()
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        let msg = match err {
            GateError::MissingToken => "missing token",
            GateError::WrongTokenFormat => "wrong token format",
            GateError::InvalidToken => "invalid token",
        };
        ApiError::Unauthenticated(msg)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => ApiError::BadRequest(msg.to_string()),
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::UserAlreadyExists => ApiError::Conflict(err.to_string()),
            other => {
                error!("auth failure: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl From<KeeperError> for ApiError {
    fn from(err: KeeperError) -> Self {
        match err {
            KeeperError::FileCannotBeSaved
            | KeeperError::FileCannotBeUpdated
            | KeeperError::UnknownEntity(_)
            | KeeperError::InvalidUpload(_) => ApiError::BadRequest(err.to_string()),
            KeeperError::FileNotFound | KeeperError::EntityNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            other => {
                error!("keeper failure: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<EntityDecodeError> for ApiError {
    fn from(err: EntityDecodeError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<UnknownEntityKind> for ApiError {
    fn from(err: UnknownEntityKind) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
