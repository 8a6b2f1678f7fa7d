//! Structured error types with stable codes and HTTP status mapping
//!
//! Every failure a handler can surface is one of these variants; the
//! response body never carries stack traces or internal identifiers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error response for API clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,
}

/// Application error types with proper categorization
#[derive(Debug)]
pub enum AppError {
    // Authentication (401) - no credential presented at all
    Unauthenticated(String),

    // Authentication (403) - credential presented but failed verification.
    // Malformed, expired and bad-signature tokens are deliberately not
    // distinguished to the caller.
    InvalidCredential(String),

    // Validation (400)
    InvalidInput { field: String, reason: String },

    // Not found (404)
    StudentNotFound(String),

    // Authorization (403) - school scope mismatch without admin override
    Forbidden(String),

    // Generation service (503) - retry budget exhausted against the
    // provider's transient-overload signal
    GenerationOverloaded { attempts: u32 },

    // Generation service (500) - any non-transient generation failure
    GenerationFailed(String),

    // Storage (500)
    Storage(String),

    // Generic wrapper for external errors
    Internal(anyhow::Error),
}

impl AppError {
    /// Storage failure from any underlying error
    pub fn storage(err: impl fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    /// Missing or malformed request field
    pub fn invalid_input(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Get error code for client identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::InvalidCredential(_) => "INVALID_CREDENTIAL",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::StudentNotFound(_) => "STUDENT_NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::GenerationOverloaded { .. } => "GENERATION_OVERLOADED",
            Self::GenerationFailed(_) => "GENERATION_FAILED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,

            Self::InvalidCredential(_) | Self::Forbidden(_) => StatusCode::FORBIDDEN,

            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,

            Self::StudentNotFound(_) => StatusCode::NOT_FOUND,

            Self::GenerationOverloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,

            Self::GenerationFailed(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get detailed error message
    pub fn message(&self) -> String {
        match self {
            Self::Unauthenticated(msg) => format!("Authentication required: {msg}"),
            Self::InvalidCredential(msg) => format!("Invalid credential: {msg}"),
            Self::InvalidInput { field, reason } => {
                format!("Invalid input for field '{field}': {reason}")
            }
            Self::StudentNotFound(id) => format!("Student not found: {id}"),
            Self::Forbidden(msg) => format!("Forbidden: {msg}"),
            Self::GenerationOverloaded { attempts } => {
                format!("Generation service is overloaded; gave up after {attempts} attempts")
            }
            Self::GenerationFailed(msg) => format!("Insight generation failed: {msg}"),
            Self::Storage(msg) => format!("Storage error: {msg}"),
            Self::Internal(err) => format!("Internal error: {err}"),
        }
    }

    /// Convert to structured error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.message(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

/// Convert from anyhow::Error to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

/// Axum IntoResponse implementation for proper HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.to_response();

        (status, Json(body)).into_response()
    }
}

/// Helper trait to convert validation errors
pub trait ValidationErrorExt<T> {
    fn map_validation_err(self, field: &str) -> Result<T>;
}

impl<T> ValidationErrorExt<T> for anyhow::Result<T> {
    fn map_validation_err(self, field: &str) -> Result<T> {
        self.map_err(|e| AppError::InvalidInput {
            field: field.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;
