//! Error types for redraft-gen HTTP handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{LedgerError, OrchestratorError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Not enough credits (402)
    #[error("Payment required: {0}")]
    PaymentRequired(String),

    /// Conflict (409) - task already processing/completed, nothing to start
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Precondition failed (412) - e.g. no fetch credential stored
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// redraft-common error
    #[error("Common error: {0}")]
    Common(#[from] redraft_common::Error),
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Validation(_) => ApiError::BadRequest(err.to_string()),
            OrchestratorError::NotFound(_) => ApiError::NotFound(err.to_string()),
            OrchestratorError::AlreadyProcessing
            | OrchestratorError::AlreadyCompleted
            | OrchestratorError::NoPendingItems => ApiError::Conflict(err.to_string()),
            OrchestratorError::MissingFetchCredential(_) => {
                ApiError::PreconditionFailed(err.to_string())
            }
            OrchestratorError::Database(e) => ApiError::Common(e),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance { .. } => ApiError::PaymentRequired(err.to_string()),
            LedgerError::InvalidAmount(_) => ApiError::BadRequest(err.to_string()),
            LedgerError::Database(e) => ApiError::Common(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PaymentRequired(msg) => {
                (StatusCode::PAYMENT_REQUIRED, "INSUFFICIENT_CREDITS", msg)
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::PreconditionFailed(msg) => {
                (StatusCode::PRECONDITION_FAILED, "PRECONDITION_FAILED", msg)
            }
            ApiError::Common(ref err) => {
                let status = match err {
                    redraft_common::Error::NotFound(_) => StatusCode::NOT_FOUND,
                    redraft_common::Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, "COMMON_ERROR", err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
