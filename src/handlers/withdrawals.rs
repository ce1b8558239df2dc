//! Withdrawal HTTP handlers.
//!
//! - POST /withdrawals - Request a withdrawal
//! - GET /withdrawals - List the caller's withdrawals

use axum::{
    Extension, Json,
    extract::{Query, State, rejection::JsonRejection},
};

use super::{ApiResult, created, ok};
use crate::{
    middleware::auth::AuthContext,
    models::{
        Pagination,
        withdrawal::{CreateWithdrawalRequest, WithdrawalListItem, WithdrawalSummary},
    },
    services::withdrawal_service,
    state::AppState,
};

/// Request a withdrawal.
///
/// # Endpoint
///
/// `POST /withdrawals`
///
/// # Request Body
///
/// ```json
/// {
///   "amount": 100000,
///   "bank_account_id": "550e8400-e29b-41d4-a716-446655440000"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: withdrawal summary, account number masked as `123****890`
/// - **400**: amount out of bounds or fractional, bank inactive, or insufficient balance
/// - **404**: bank account not found for the caller
///
/// The full amount is debited immediately; the charge comes out of it.
pub async fn create_withdrawal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<CreateWithdrawalRequest>, JsonRejection>,
) -> ApiResult<WithdrawalSummary> {
    let Json(request) = payload?;

    let summary =
        withdrawal_service::create(&state.pool, &state.config, auth.user()?, request).await?;

    created("Withdrawal requested", summary)
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
) -> ApiResult<Vec<WithdrawalListItem>> {
    let rows = withdrawal_service::list_for_user(&state.pool, auth.user()?, &page).await?;
    ok("Withdrawals", rows)
}
