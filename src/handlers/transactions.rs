//! Ledger history handler.
//!
//! - GET /transactions?type=&page=&limit= - The caller's ledger entries, newest first

use axum::{
    Extension,
    extract::{Query, State},
};

use super::{ApiResult, ok};
use crate::{
    db::DbPool,
    middleware::auth::AuthContext,
    models::{
        Pagination,
        transaction::{Transaction, TransactionFilter},
    },
    services::ledger,
};

/// List the caller's ledger entries.
///
/// # Query
///
/// - `type`: optional, one of `investment`, `return`, `team`, `referral_bonus`,
///   `withdrawal`, `refund`
/// - `page`, `limit`: pagination (default limit 25, max 50)
///
/// # Response (200)
///
/// ```json
/// {
///   "success": true,
///   "message": "Transactions",
///   "data": [
///     {
///       "id": "770e8400-...",
///       "amount": 13000.0,
///       "charge": 0.0,
///       "order_id": "RET20250101093000123456789",
///       "transaction_flow": "debit",
///       "transaction_type": "return",
///       "message": "Daily return 1/30",
///       "status": "Success",
///       "created_at": "2025-01-01T09:30:00Z"
///     }
///   ]
/// }
/// ```
pub async fn list_transactions(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<TransactionFilter>,
    Query(page): Query<Pagination>,
) -> ApiResult<Vec<Transaction>> {
    let kind = filter
        .transaction_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let rows = ledger::list_for_user(&pool, auth.user()?, kind, &page).await?;
    ok("Transactions", rows)
}
