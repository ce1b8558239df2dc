//! Daily return trigger, called by an external scheduler.

use axum::{extract::State, http::HeaderMap};
use chrono::Utc;
use serde::Serialize;

use super::{ApiResult, ok};
use crate::{error::AppError, middleware::auth::hash_secret, services::scheduler, state::AppState};

pub const CRON_KEY_HEADER: &str = "x-cron-key";

#[derive(Debug, Serialize)]
pub struct DailyReturnsResponse {
    pub processed: u64,
}

/// Run the daily return job.
///
/// # Endpoint
///
/// `POST /cron/daily-returns` with header `X-CRON-KEY: <CRON_KEY>`
///
/// # Response
///
/// - **200**: `{"processed": <count>}` inside the envelope
/// - **401**: header missing or wrong
pub async fn daily_returns(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<DailyReturnsResponse> {
    let provided = headers
        .get(CRON_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    if hash_secret(provided) != hash_secret(&state.config.cron_key) {
        tracing::warn!("daily return trigger with wrong cron key");
        return Err(AppError::Unauthorized);
    }

    let processed = scheduler::run_daily_returns(&state.pool, Utc::now()).await?;
    ok("Daily returns processed", DailyReturnsResponse { processed })
}
