//! Health check endpoint for service monitoring.

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ApiResult, ok};
use crate::db::DbPool;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Database connection status
    pub database: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "success": true,
///   "message": "healthy",
///   "data": { "database": "connected", "timestamp": "2025-12-21T19:00:00Z" }
/// }
/// ```
///
/// If the database is unreachable the standard error envelope is returned with 500.
pub async fn health_check(State(pool): State<DbPool>) -> ApiResult<HealthResponse> {
    sqlx::query("SELECT 1").execute(&pool).await?;

    ok(
        "healthy",
        HealthResponse {
            database: "connected".to_string(),
            timestamp: Utc::now(),
        },
    )
}
