//! Payment detail and gateway callback handlers.
//!
//! Callbacks answer 200 whenever the payload was understood, including
//! when nothing changed, so gateways stop retrying. Only unreadable
//! payloads (400) and unknown gateways or orders (404) are errors.

use axum::{
    Extension,
    body::Bytes,
    extract::{Path, State},
};

use super::{ApiResult, ack, ok};
use crate::{
    error::AppError,
    gateway::{GatewayError, GatewayKind},
    middleware::auth::AuthContext,
    models::payment::PaymentDetailResponse,
    services::{investment_service, withdrawal_service},
    state::AppState,
};

/// Payment detail for one of the caller's orders.
///
/// # Endpoint
///
/// `GET /payments/{order_id}`
pub async fn payment_detail(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<String>,
) -> ApiResult<PaymentDetailResponse> {
    let detail = investment_service::payment_detail(&state.pool, auth.user()?, &order_id).await?;
    ok("Payment detail", detail)
}

fn resolve_gateway(segment: &str) -> Result<GatewayKind, AppError> {
    GatewayKind::from_path(segment).ok_or(AppError::NotFound("Gateway"))
}

/// Callback payload problems never echo gateway detail back.
fn callback_error(gateway: GatewayKind, error: GatewayError) -> AppError {
    tracing::warn!(gateway = gateway.as_str(), error = %error, "rejected gateway callback");
    match error {
        GatewayError::Unsupported(_) => AppError::NotFound("Gateway"),
        _ => AppError::Validation("Invalid callback payload".to_string()),
    }
}

/// Charge callback.
///
/// # Endpoint
///
/// `POST /payments/{gateway}/webhook` where the gateway is `kytapay` (or `kyta`) or `pakasir`.
///
/// # Response
///
/// - **200**: processed, or ignored because the investment had already settled
/// - **400**: payload could not be parsed or carries no order ID
/// - **404**: unknown gateway or order ID
pub async fn payment_webhook(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    body: Bytes,
) -> ApiResult<()> {
    let kind = resolve_gateway(&gateway)?;
    let callback = kind
        .parse_payment_callback(&body)
        .map_err(|e| callback_error(kind, e))?;

    investment_service::settle_payment(&state.pool, &callback).await?;
    ack("Callback processed")
}

/// Payout callback.
///
/// # Endpoint
///
/// `POST /payouts/{gateway}/webhook`
///
/// Success callbacks are acknowledged and ignored. A failure for a
/// Processing withdrawal reverts it to Pending for re-approval.
pub async fn payout_webhook(
    State(state): State<AppState>,
    Path(gateway): Path<String>,
    body: Bytes,
) -> ApiResult<()> {
    let kind = resolve_gateway(&gateway)?;
    let callback = kind
        .parse_payout_callback(&body)
        .map_err(|e| callback_error(kind, e))?;

    withdrawal_service::settle_payout(&state.pool, &callback).await?;
    ack("Callback processed")
}
