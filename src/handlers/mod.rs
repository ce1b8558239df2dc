//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Delegates to a service
//! 3. Wraps the result in the [`ApiResponse`] envelope

use axum::{Json, http::StatusCode};
use serde::Serialize;

use crate::error::AppError;

/// Investor profile and product catalogue
pub mod account;
/// Admin investment and withdrawal endpoints
pub mod admin;
/// Daily return trigger
pub mod cron;
/// Service health probe
pub mod health;
/// Investment purchase and listings
pub mod investments;
/// Payment detail and gateway callbacks
pub mod payments;
/// Ledger history
pub mod transactions;
/// Withdrawal requests
pub mod withdrawals;

/// Uniform response envelope.
///
/// ```json
/// { "success": true, "message": "Investment created", "data": { ... } }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

pub fn ok<T: Serialize>(message: &str, data: T) -> ApiResult<T> {
    respond(StatusCode::OK, message, Some(data))
}

pub fn created<T: Serialize>(message: &str, data: T) -> ApiResult<T> {
    respond(StatusCode::CREATED, message, Some(data))
}

/// Success without a payload.
pub fn ack(message: &str) -> ApiResult<()> {
    respond(StatusCode::OK, message, None)
}

fn respond<T: Serialize>(status: StatusCode, message: &str, data: Option<T>) -> ApiResult<T> {
    Ok((
        status,
        Json(ApiResponse {
            success: true,
            message: message.to_string(),
            data,
        }),
    ))
}
