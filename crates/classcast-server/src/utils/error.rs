use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use classcast_registry::{CreateError, ResolveError};
use serde::Serialize;
use thiserror::Error;

use crate::intake::IntakeError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_type, message) = match self {
            ApiError::Unauthorized(msg) => ("Unauthorized", msg),
            ApiError::Forbidden(msg) => {
                tracing::warn!("Forbidden: {}", msg);
                ("Forbidden", msg)
            }
            ApiError::NotFound(msg) => ("NotFound", msg),
            ApiError::Gone(msg) => ("Gone", msg),
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                ("BadRequest", msg)
            }
            ApiError::PayloadTooLarge(msg) => {
                tracing::warn!("Payload too large: {}", msg);
                ("PayloadTooLarge", msg)
            }
            ApiError::TooManyRequests(msg) => ("TooManyRequests", msg),
            ApiError::ServiceUnavailable(msg) => {
                tracing::error!("Service unavailable: {}", msg);
                ("ServiceUnavailable", msg)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("InternalError", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Registry outcomes as seen by a browser. Expired and Gone look the same.
impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidCode => ApiError::NotFound("Invalid or missing code.".to_string()),
            ResolveError::NotFound => ApiError::NotFound("Code not found or expired.".to_string()),
            ResolveError::Expired => ApiError::Gone("File expired.".to_string()),
            ResolveError::Gone => ApiError::Gone("File deleted before download.".to_string()),
            ResolveError::PinRequired => ApiError::Unauthorized("PIN required or incorrect.".to_string()),
        }
    }
}

impl From<CreateError> for ApiError {
    fn from(err: CreateError) -> Self {
        match err {
            CreateError::InvalidPin { .. } => ApiError::BadRequest(err.to_string()),
            CreateError::CodeSpaceExhausted { .. } => {
                ApiError::ServiceUnavailable("No free share code, try again later.".to_string())
            }
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::UnsupportedType(_) | IntakeError::Empty | IntakeError::Stream(_) => {
                ApiError::BadRequest(err.to_string())
            }
            IntakeError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            IntakeError::Io(e) => ApiError::InternalError(format!("Failed to store upload: {}", e)),
        }
    }
}
