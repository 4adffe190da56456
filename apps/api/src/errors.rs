use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::intake::extractor::ExtractionError;
use crate::llm_client::CompletionError;
use crate::screening::shortlist::SessionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("No files uploaded")]
    NoFilesProvided,

    #[error("Job description must be at least {required} words (got {actual})")]
    InsufficientJobDescription { actual: usize, required: usize },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Session store error: {0}")]
    Session(#[from] SessionError),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::NoFilesProvided => (
                StatusCode::BAD_REQUEST,
                "NO_FILES_PROVIDED",
                self.to_string(),
            ),
            AppError::InsufficientJobDescription { .. } => (
                StatusCode::BAD_REQUEST,
                "INSUFFICIENT_JOB_DESCRIPTION",
                self.to_string(),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                self.to_string(),
            ),
            AppError::Extraction(e @ ExtractionError::UnsupportedFormat(_)) => {
                (StatusCode::BAD_REQUEST, "UNSUPPORTED_FORMAT", e.to_string())
            }
            AppError::Extraction(e) => {
                tracing::error!("Extraction error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EXTRACTION_FAILED",
                    "Failed to process resume".to_string(),
                )
            }
            AppError::Completion(e) => {
                tracing::error!("Completion error: {e}");
                let (code, message) = match e {
                    CompletionError::RateLimited { .. } => (
                        "RATE_LIMITED",
                        "The analysis service is busy, please try again shortly",
                    ),
                    _ => ("COMPLETION_FAILED", "Failed to analyze resume"),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, code, message.to_string())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Session(e) => {
                tracing::error!("Session store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SESSION_ERROR",
                    "A session storage error occurred".to_string(),
                )
            }
            AppError::S3(msg) => {
                tracing::error!("S3 error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "S3_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
