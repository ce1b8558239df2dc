//! Investor profile and product catalogue.
//!
//! - GET /me - Caller's balance, totals, level and spin tickets
//! - GET /products - Active products ordered by tier

use axum::{Extension, extract::State};

use super::{ApiResult, ok};
use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        product::Product,
        user::{ProfileResponse, User},
    },
};

/// Get the caller's profile.
///
/// # Endpoint
///
/// `GET /me`
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "success": true,
///   "message": "Profile",
///   "data": {
///     "id": "550e8400-e29b-41d4-a716-446655440000",
///     "name": "Siti Rahma",
///     "number": "081234567890",
///     "balance": 13000.0,
///     "total_invest": 300000.0,
///     "level": 1,
///     "spin_ticket": 1,
///     "investment_status": "Active"
///   }
/// }
/// ```
pub async fn me(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ProfileResponse> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(auth.user()?)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    ok("Profile", ProfileResponse::from(user))
}

pub async fn list_products(State(pool): State<DbPool>) -> ApiResult<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE status = 'Active' ORDER BY tier, minimum_cents",
    )
    .fetch_all(&pool)
    .await?;

    ok("Products", products)
}
