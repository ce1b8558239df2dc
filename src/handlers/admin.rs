//! Admin HTTP handlers.
//!
//! - GET /admin/investments - Filtered investment listing
//! - GET /admin/investments/{id} - One investment with owner and product names
//! - PUT /admin/investments/{id}/status - Status override
//! - GET /admin/withdrawals - Filtered withdrawal listing (payout routing applied)
//! - POST /admin/withdrawals/{id}/approve
//! - POST /admin/withdrawals/{id}/reject
//! - POST /admin/withdrawals/{id}/retry-payout
//! - GET /admin/payment-settings - Payout routing settings
//! - PUT /admin/payment-settings - Create or replace them

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use uuid::Uuid;

use super::{ApiResult, ok};
use crate::{
    models::{
        Pagination,
        investment::{AdminInvestmentRow, Investment, InvestmentFilter, UpdateInvestmentStatusRequest},
        settings::{PaymentSettings, UpdatePaymentSettingsRequest},
        withdrawal::{AdminWithdrawalItem, Withdrawal, WithdrawalFilter},
    },
    services::{investment_service, settings_service, withdrawal_service},
    state::AppState,
};

pub async fn list_investments(
    State(state): State<AppState>,
    Query(filter): Query<InvestmentFilter>,
    Query(page): Query<Pagination>,
) -> ApiResult<Vec<AdminInvestmentRow>> {
    let rows = investment_service::admin_list(&state.pool, &filter, &page).await?;
    ok("Investments", rows)
}

pub async fn get_investment(
    State(state): State<AppState>,
    Path(investment_id): Path<Uuid>,
) -> ApiResult<AdminInvestmentRow> {
    let row = investment_service::admin_get(&state.pool, investment_id).await?;
    ok("Investment", row)
}

/// Override an investment's status.
///
/// # Request Body
///
/// ```json
/// { "status": "Suspended" }
/// ```
///
/// Accepted values: `Suspended`, `Cancelled`, `Completed`, `Running`.
/// Moving a Pending or Cancelled investment to Running schedules its next
/// payout 24 hours out. Balances are never touched.
pub async fn update_investment_status(
    State(state): State<AppState>,
    Path(investment_id): Path<Uuid>,
    payload: Result<Json<UpdateInvestmentStatusRequest>, JsonRejection>,
) -> ApiResult<Investment> {
    let Json(request) = payload?;
    let updated =
        investment_service::admin_set_status(&state.pool, investment_id, &request.status).await?;
    ok("Investment status updated", updated)
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Query(filter): Query<WithdrawalFilter>,
    Query(page): Query<Pagination>,
) -> ApiResult<Vec<AdminWithdrawalItem>> {
    let rows = withdrawal_service::admin_list(&state.pool, &filter, &page).await?;
    ok("Withdrawals", rows)
}

/// Approve a Pending withdrawal.
///
/// Returns `Success` when payouts are manual, or `Processing` when the
/// payout was handed to the gateway in the background. 409 if the
/// withdrawal is not Pending.
pub async fn approve_withdrawal(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<Uuid>,
) -> ApiResult<Withdrawal> {
    let updated =
        withdrawal_service::approve(&state.pool, &state.gateway, &state.config, withdrawal_id)
            .await?;
    ok("Withdrawal approved", updated)
}

/// Reject a Pending withdrawal and refund its amount.
pub async fn reject_withdrawal(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<Uuid>,
) -> ApiResult<Withdrawal> {
    let updated = withdrawal_service::reject(&state.pool, withdrawal_id).await?;
    ok("Withdrawal rejected and refunded", updated)
}

pub async fn retry_payout(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<Uuid>,
) -> ApiResult<Withdrawal> {
    let withdrawal =
        withdrawal_service::retry_payout(&state.pool, &state.gateway, &state.config, withdrawal_id)
            .await?;
    ok("Payout resubmitted", withdrawal)
}

/// 404 until settings are first saved; until then no payout is rerouted.
pub async fn get_payment_settings(State(state): State<AppState>) -> ApiResult<PaymentSettings> {
    let settings = settings_service::get(&state.pool).await?;
    ok("Payment settings", settings)
}

/// Replace the payout routing settings.
///
/// Withdrawals of at least `withdraw_threshold` from users not in
/// `wishlist_user_ids` are paid to this account instead of the user's own.
pub async fn update_payment_settings(
    State(state): State<AppState>,
    payload: Result<Json<UpdatePaymentSettingsRequest>, JsonRejection>,
) -> ApiResult<PaymentSettings> {
    let Json(request) = payload?;
    let settings = settings_service::update(&state.pool, request).await?;
    ok("Payment settings updated", settings)
}
