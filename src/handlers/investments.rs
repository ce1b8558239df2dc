//! Investment HTTP handlers.
//!
//! - POST /investments - Purchase a product
//! - GET /investments - List the caller's investments
//! - GET /investments/{id} - Get one of the caller's investments
//! - GET /investment/active - Active holdings grouped by product

use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use uuid::Uuid;

use super::{ApiResult, created, ok};
use crate::{
    middleware::auth::AuthContext,
    models::{
        Pagination,
        investment::{CreateInvestmentRequest, CreateInvestmentResponse, Investment},
    },
    services::investment_service,
    state::AppState,
};

/// Purchase an investment.
///
/// # Endpoint
///
/// `POST /investments`
///
/// # Request Body
///
/// ```json
/// {
///   "product_id": "550e8400-e29b-41d4-a716-446655440000",
///   "amount": 300000,
///   "payment_method": "BANK",
///   "payment_channel": "BCA"
/// }
/// ```
///
/// # Response
///
/// - **201 Created**: order ID, product terms, daily profit and the payment code to pay
/// - **400**: invalid method/channel, amount out of bounds, or prerequisite not met
/// - **404**: product missing or inactive
/// - **502**: the payment gateway could not create the charge
pub async fn create_investment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<CreateInvestmentRequest>, JsonRejection>,
) -> ApiResult<CreateInvestmentResponse> {
    let Json(request) = payload?;

    let response = investment_service::create(
        &state.pool,
        state.gateway.as_ref(),
        auth.user()?,
        request,
    )
    .await?;

    created("Investment created, awaiting payment", response)
}

/// List the caller's investments, newest first.
///
/// Query: `page` (from 1), `limit` (default 25, max 50).
pub async fn list_investments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
) -> ApiResult<Vec<Investment>> {
    let rows = investment_service::list_for_user(&state.pool, auth.user()?, &page).await?;
    ok("Investments", rows)
}

pub async fn get_investment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(investment_id): Path<Uuid>,
) -> ApiResult<Investment> {
    let investment =
        investment_service::get_for_user(&state.pool, auth.user()?, investment_id).await?;
    ok("Investment", investment)
}

/// Running, Completed and Suspended investments keyed by product name.
pub async fn active_investments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<BTreeMap<String, Vec<Investment>>> {
    let grouped = investment_service::active_by_product(&state.pool, auth.user()?).await?;
    ok("Active investments", grouped)
}
