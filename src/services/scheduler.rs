//! Daily return job.
//!
//! Pays one day of profit to every due investment. Each investment is
//! handled in its own transaction, so one failure neither rolls back nor
//! stops the others. A failed investment keeps its counters and is picked
//! up again by the next run.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        investment::Investment,
        transaction::{
            NewTransaction, TransactionFlow, TransactionStatus, TransactionType, generate_order_id,
        },
    },
    services::{
        ledger,
        referral::{self, BonusVariant},
    },
};

/// Pay every investment due at `now` and return how many were paid.
pub async fn run_daily_returns(pool: &DbPool, now: DateTime<Utc>) -> Result<u64, AppError> {
    let due: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM investments
        WHERE status = 'Running'
          AND next_return_at IS NOT NULL
          AND next_return_at <= $1
          AND total_paid < duration
        ORDER BY next_return_at
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await?;

    let mut processed = 0u64;
    for investment_id in &due {
        match pay_one(pool, *investment_id, now).await {
            Ok(true) => processed += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::error!(investment_id = %investment_id, error = %e, "daily return failed");
            }
        }
    }

    tracing::info!(due = due.len(), processed, "daily return run finished");
    Ok(processed)
}

/// Pay one day of profit. Returns false when the investment is no longer due.
async fn pay_one(pool: &DbPool, investment_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
    let mut tx = pool.begin().await?;

    let investment = sqlx::query_as::<_, Investment>(
        "SELECT * FROM investments WHERE id = $1 FOR UPDATE",
    )
    .bind(investment_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Investment"))?;

    // A concurrent run may have paid it since selection
    if !investment.is_due(now) {
        return Ok(false);
    }

    let owner = ledger::lock_user(&mut tx, investment.user_id).await?;

    // Nothing to credit on a zero-profit row, but it still advances so it completes
    if investment.daily_profit_cents > 0 {
        ledger::credit(&mut tx, owner.id, investment.daily_profit_cents).await?;
        ledger::record(
            &mut tx,
            &NewTransaction {
                user_id: owner.id,
                amount_cents: investment.daily_profit_cents,
                charge_cents: 0,
                order_id: generate_order_id("RET"),
                flow: TransactionFlow::Debit,
                kind: TransactionType::Return,
                message: Some(format!(
                    "Daily return {}/{}",
                    investment.total_paid + 1,
                    investment.duration
                )),
                status: TransactionStatus::Success,
            },
        )
        .await?;

        referral::distribute(
            &mut tx,
            BonusVariant::DailyTeam,
            owner.reff_by,
            owner.effective_level(),
            investment.daily_profit_cents,
        )
        .await?;
    } else {
        tracing::warn!(investment_id = %investment.id, "investment earns no daily profit");
    }

    let advance = investment.advance(now);
    sqlx::query(
        r#"
        UPDATE investments
        SET total_paid = $1,
            total_returned_cents = $2,
            last_return_at = $3,
            next_return_at = $4,
            status = $5,
            updated_at = NOW()
        WHERE id = $6
        "#,
    )
    .bind(advance.total_paid)
    .bind(advance.total_returned_cents)
    .bind(advance.last_return_at)
    .bind(advance.next_return_at)
    .bind(advance.status)
    .bind(investment.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        investment_id = %investment.id,
        user_id = %owner.id,
        total_paid = advance.total_paid,
        status = ?advance.status,
        "daily return paid"
    );

    Ok(true)
}
