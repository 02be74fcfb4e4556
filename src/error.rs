use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::storage::StoreError;

/// Bearer token failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Access denied. No token provided.")]
    Missing,
    #[error("Invalid token")]
    Malformed,
    #[error("Token expired")]
    Expired,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("User already exists")]
    DuplicateEmail,

    #[error("Username already taken")]
    DuplicateUsername,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Access denied. Admins only.")]
    Forbidden,

    #[error("User not found")]
    NotFound,

    #[error("Too many requests, please try again later.")]
    RateLimited,

    #[error("user store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::DuplicateEmail
            | AppError::DuplicateUsername
            | AppError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::Missing) => StatusCode::UNAUTHORIZED,
            AppError::Auth(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::StoreUnavailable(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::DuplicateEmail => "duplicate_email",
            AppError::DuplicateUsername => "duplicate_username",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Auth(AuthError::Missing) => "missing_token",
            AppError::Auth(AuthError::Malformed) => "invalid_token",
            AppError::Auth(AuthError::Expired) => "expired_token",
            AppError::Forbidden => "forbidden",
            AppError::NotFound => "not_found",
            AppError::RateLimited => "rate_limit",
            AppError::StoreUnavailable(_) | AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail(_) => AppError::DuplicateEmail,
            StoreError::DuplicateUsername(_) => AppError::DuplicateUsername,
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::StoreUnavailable(msg) | AppError::Internal(msg) => {
                tracing::error!(error = %msg, kind = self.kind(), "request failed");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        (
            self.status(),
            Json(json!({
                "error": {
                    "type": self.kind(),
                    "message": message
                }
            })),
        )
            .into_response()
    }
}
