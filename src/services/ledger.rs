//! Ledger primitives: locked balance mutation and ledger entry creation.
//!
//! Every function here takes a connection that the caller has already
//! turned into a transaction (`&mut *tx`). Balance changes and the
//! transaction row documenting them are written inside that same atomic
//! unit, and the caller decides when to commit.
//!
//! # Locking
//!
//! `lock_user`, `credit` and `debit` take `FOR UPDATE` on the user row, so
//! concurrent withdrawals, returns and bonuses touching one user are
//! serialized by PostgreSQL.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        Pagination,
        transaction::{NewTransaction, Transaction, TransactionStatus},
        user::User,
    },
};

/// Lock a user row for the rest of the enclosing transaction.
pub async fn lock_user(conn: &mut PgConnection, user_id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("User"))
}

/// Add `amount_cents` to a user's balance and return the new balance.
///
/// # Errors
///
/// - `Validation`: amount is zero or negative
/// - `NotFound`: the user doesn't exist
pub async fn credit(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount_cents: i64,
) -> Result<i64, AppError> {
    if amount_cents <= 0 {
        return Err(AppError::Validation("Amount must be positive".to_string()));
    }

    // UPDATE takes the row lock itself
    sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE users
        SET balance_cents = balance_cents + $1,
            updated_at = NOW()
        WHERE id = $2
        RETURNING balance_cents
        "#,
    )
    .bind(amount_cents)
    .bind(user_id)
    .fetch_optional(conn)
    .await?
    .ok_or(AppError::NotFound("User"))
}

/// Remove `amount_cents` from a user's balance and return the new balance.
///
/// # Errors
///
/// - `Validation`: amount is zero or negative
/// - `NotFound`: the user doesn't exist
/// - `InsufficientFunds`: balance is lower than the amount; the caller must
///   drop its transaction
pub async fn debit(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount_cents: i64,
) -> Result<i64, AppError> {
    if amount_cents <= 0 {
        return Err(AppError::Validation("Amount must be positive".to_string()));
    }

    let balance_cents: i64 =
        sqlx::query_scalar("SELECT balance_cents FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(AppError::NotFound("User"))?;

    if balance_cents < amount_cents {
        return Err(AppError::InsufficientFunds);
    }

    let new_balance = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE users
        SET balance_cents = balance_cents - $1,
            updated_at = NOW()
        WHERE id = $2
        RETURNING balance_cents
        "#,
    )
    .bind(amount_cents)
    .bind(user_id)
    .fetch_one(conn)
    .await?;

    Ok(new_balance)
}

/// Insert a ledger entry.
pub async fn record(
    conn: &mut PgConnection,
    entry: &NewTransaction,
) -> Result<Transaction, AppError> {
    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            user_id,
            amount_cents,
            charge_cents,
            order_id,
            transaction_flow,
            transaction_type,
            message,
            status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, user_id, amount_cents, charge_cents, order_id,
                  transaction_flow, transaction_type, message, status, created_at
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.amount_cents)
    .bind(entry.charge_cents)
    .bind(&entry.order_id)
    .bind(entry.flow)
    .bind(entry.kind.as_str())
    .bind(&entry.message)
    .bind(entry.status)
    .fetch_one(conn)
    .await?;

    Ok(transaction)
}

/// Settle the ledger entry identified by `order_id`.
///
/// Returns the number of rows changed (0 when no entry carries that order ID).
pub async fn set_status(
    conn: &mut PgConnection,
    order_id: &str,
    status: TransactionStatus,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE transactions SET status = $1, updated_at = NOW() WHERE order_id = $2",
    )
    .bind(status)
    .bind(order_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// A user's ledger history, newest first, optionally filtered by type.
pub async fn list_for_user(
    pool: &DbPool,
    user_id: Uuid,
    transaction_type: Option<&str>,
    page: &Pagination,
) -> Result<Vec<Transaction>, AppError> {
    let rows = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT id, user_id, amount_cents, charge_cents, order_id,
               transaction_flow, transaction_type, message, status, created_at
        FROM transactions
        WHERE user_id = $1
          AND ($2::TEXT IS NULL OR transaction_type = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(transaction_type)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
