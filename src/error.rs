//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::gateway::GatewayError;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Validation**: bad input shape or range, user-correctable
/// - **Identity**: missing or invalid bearer token or cron secret
/// - **Resource**: requested entity not found or not owned by the caller
/// - **State**: invalid state transition or duplicate resource
/// - **Ledger**: balance guard rejected a debit
/// - **Upstream**: payment gateway failure
/// - **Internal**: persistence or unexpected failure (details are logged, never returned)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (connection error, query error, constraint violation).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Request body or parameters are invalid.
    #[error("{0}")]
    Validation(String),

    /// The caller does not meet a product's investment prerequisite.
    #[error("{0}")]
    Ineligible(String),

    /// Bearer token or shared secret is missing, invalid, or inactive.
    #[error("Unauthorized")]
    Unauthorized,

    /// Requested entity does not exist or doesn't belong to the caller.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The entity is not in a state that allows the requested transition.
    #[error("{0}")]
    Conflict(String),

    /// Balance is lower than the requested debit.
    #[error("Insufficient balance")]
    InsufficientFunds,

    /// The payment gateway failed or answered with a non-success response.
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Unexpected failure outside the database.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Ineligible(_) => (StatusCode::BAD_REQUEST, "ineligible"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::InsufficientFunds => (StatusCode::BAD_REQUEST, "insufficient_funds"),
            AppError::Gateway(_) => (StatusCode::BAD_GATEWAY, "gateway_error"),
            AppError::Database(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }

    /// Message safe to show to API clients.
    ///
    /// Database, gateway and internal details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal(_) => {
                "An internal error occurred".to_string()
            }
            AppError::Gateway(_) => "Payment service is unavailable, try again later".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors use the same envelope as successful responses:
/// ```json
/// {
///   "success": false,
///   "message": "Human-readable error message",
///   "code": "error_type"
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        match &self {
            AppError::Database(e) => tracing::error!(error = %e, "database error"),
            AppError::Internal(e) => tracing::error!(error = %e, "internal error"),
            AppError::Gateway(e) => tracing::warn!(error = %e, "gateway error"),
            _ => {}
        }

        let body = Json(json!({
            "success": false,
            "message": self.client_message(),
            "code": code,
        }));

        (status, body).into_response()
    }
}
