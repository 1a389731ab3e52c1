//! Error types for Libris server

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Machine-readable error type carried in the `error.type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    BadRequest,
    Conflict,
    BookUnavailable,
    InvalidTransition,
    DuplicateBorrow,
    BorrowInProgress,
    Database,
    Internal,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Book unavailable: {0}")]
    BookUnavailable(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Duplicate borrow: {0}")]
    DuplicateBorrow(String),

    #[error("Borrow in progress: {0}")]
    BorrowInProgress(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Inner `error` object of the error envelope
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub message: String,
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub error: ErrorBody,
}

impl AppError {
    /// HTTP status, error type and client-facing message for this error
    pub fn parts(&self) -> (StatusCode, ErrorType, String) {
        match self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorType::Unauthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorType::Forbidden, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorType::NotFound, msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorType::Validation, msg.clone())
            }
            AppError::Database(e) => database_parts(e),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorType::Conflict, msg.clone()),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorType::BadRequest, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorType::Internal,
                    "Internal server error".to_string(),
                )
            }
            AppError::BookUnavailable(msg) => {
                (StatusCode::CONFLICT, ErrorType::BookUnavailable, msg.clone())
            }
            AppError::InvalidTransition(msg) => {
                (StatusCode::CONFLICT, ErrorType::InvalidTransition, msg.clone())
            }
            AppError::DuplicateBorrow(msg) => {
                (StatusCode::CONFLICT, ErrorType::DuplicateBorrow, msg.clone())
            }
            AppError::BorrowInProgress(msg) => {
                (StatusCode::CONFLICT, ErrorType::BorrowInProgress, msg.clone())
            }
        }
    }
}

/// Constraint violations surface as conflicts; anything else is a 500.
fn database_parts(e: &sqlx::Error) -> (StatusCode, ErrorType, String) {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return (
                StatusCode::CONFLICT,
                ErrorType::Conflict,
                "Record already exists".to_string(),
            );
        }
        if db_err.is_check_violation() {
            return (
                StatusCode::CONFLICT,
                ErrorType::BookUnavailable,
                "Inventory counters would become inconsistent".to_string(),
            );
        }
        if db_err.is_foreign_key_violation() {
            return (
                StatusCode::CONFLICT,
                ErrorType::Conflict,
                "Record is referenced by other records".to_string(),
            );
        }
    }

    tracing::error!("Database error: {:?}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorType::Database,
        "Database error".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();

        let body = Json(ErrorResponse {
            status_code: status.as_u16(),
            error: ErrorBody {
                error_type,
                message,
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
