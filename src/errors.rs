use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::policy::Denied;

/// ErrorBody
///
/// The JSON shape of every failure response: a stable machine-readable `code`
/// plus a human-readable message. Clients branch on `code`, never on the text.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// ApiError
///
/// The full failure taxonomy surfaced by the HTTP layer. Every variant maps to a
/// fixed status and reason code; nothing here is retried — retry policy belongs
/// to the datastore client, not the core.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Duplicate username or email at registration.
    #[error("username or email already registered")]
    Conflict,

    /// A role value outside the closed student/teacher/admin set.
    #[error("invalid role, must be one of: student, teacher, admin")]
    InvalidRole,

    /// Login failure. Deliberately uniform: the response never distinguishes an
    /// unknown username from a wrong password, to avoid enumeration.
    #[error("incorrect username or password")]
    InvalidCredentials,

    /// Signature failure or malformed token payload.
    #[error("invalid token")]
    InvalidToken,

    /// Structurally valid token past its expiry.
    #[error("token expired")]
    Expired,

    /// Authorization guard refusal; carries the guard's reason code.
    #[error("access denied: {0}")]
    Denied(Denied),

    /// Resource lookup miss.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Field-constraint violation in a request payload.
    #[error("{0}")]
    Validation(String),

    /// Unexpected lower-layer failure. The detail is logged where it occurred;
    /// the caller only ever sees a generic message.
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Conflict | ApiError::InvalidRole => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials | ApiError::InvalidToken | ApiError::Expired => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Denied(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Conflict => "conflict",
            ApiError::InvalidRole => "invalid_role",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::InvalidToken => "invalid_token",
            ApiError::Expired => "token_expired",
            ApiError::Denied(denied) => denied.reason(),
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation(_) => "validation_error",
            ApiError::Internal => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        // Every 401 carries the bearer challenge (RFC 6750).
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<Denied> for ApiError {
    fn from(denied: Denied) -> Self {
        ApiError::Denied(denied)
    }
}

/// Shorthand for handler return types.
pub type ApiResult<T> = Result<T, ApiError>;
