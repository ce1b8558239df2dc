//! Withdrawal service - balance hold, approval, rejection and payouts.
//!
//! # Balance Hold
//!
//! The full amount is debited when the withdrawal is created. Rejection
//! credits it back; an approved or failed payout keeps it.
//!
//! # Auto Payout
//!
//! With `AUTO_WITHDRAW` enabled, approval commits `Processing` and hands the
//! payout to a background task. Processing is the recovery checkpoint:
//! if the gateway outcome is unknown (network error, timeout, crash) the
//! withdrawal stays there until a payout callback reverts it to Pending or
//! an admin retries the payout.
//!
//! Every gateway call is preceded by a claim on the withdrawal row
//! (`payout_attempt_id`, `payout_attempted_at`). A second attempt can't
//! claim while the first is in flight, and only the claiming attempt can
//! record Success or Failed.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    gateway::{GatewayError, PaymentGateway, PayoutCallback, PayoutRequest},
    models::{
        Pagination, RecordStatus,
        bank::{BankAccountDetails, mask_account_number},
        settings::route_payout,
        transaction::{
            NewTransaction, TransactionFlow, TransactionStatus, TransactionType, generate_order_id,
        },
        withdrawal::{
            AdminWithdrawalItem, CreateWithdrawalRequest, Withdrawal, WithdrawalFilter,
            WithdrawalListItem, WithdrawalListRow, WithdrawalQuote, WithdrawalStatus,
            WithdrawalSummary,
        },
    },
    services::{ledger, settings_service},
};

/// How a payout attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutOutcome {
    /// The gateway accepted the transfer
    Paid,
    /// The gateway refused it; the withdrawal fails without refund
    Refused(String),
    /// Unknown result; the withdrawal stays Processing
    Indeterminate(String),
}

impl PayoutOutcome {
    /// Classify a gateway result. `None` means the task ran out of time.
    pub fn classify(result: Option<Result<(), GatewayError>>) -> Self {
        match result {
            Some(Ok(())) => PayoutOutcome::Paid,
            Some(Err(e)) if e.is_indeterminate() => PayoutOutcome::Indeterminate(e.to_string()),
            Some(Err(e)) => PayoutOutcome::Refused(e.to_string()),
            None => PayoutOutcome::Indeterminate("payout timed out".to_string()),
        }
    }
}

/// What a payout callback did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutCallbackOutcome {
    /// Success callbacks are never acted on; approval is the authority for Success
    Ignored,
    /// Processing -> Pending, ready for re-approval
    Reverted,
    /// The withdrawal was not Processing
    Unchanged,
}

async fn account_for_user(
    pool: &DbPool,
    user_id: Uuid,
    bank_account_id: Uuid,
) -> Result<BankAccountDetails, AppError> {
    sqlx::query_as::<_, BankAccountDetails>(
        r#"
        SELECT ba.id, ba.user_id, ba.account_name, ba.account_number,
               b.name AS bank_name, b.code AS bank_code, b.status AS bank_status
        FROM bank_accounts ba
        JOIN banks b ON b.id = ba.bank_id
        WHERE ba.id = $1 AND ba.user_id = $2
        "#,
    )
    .bind(bank_account_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Bank account"))
}

async fn lock_withdrawal(
    conn: &mut sqlx::PgConnection,
    withdrawal_id: Uuid,
) -> Result<Withdrawal, AppError> {
    sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = $1 FOR UPDATE")
        .bind(withdrawal_id)
        .fetch_optional(conn)
        .await?
        .ok_or(AppError::NotFound("Withdrawal"))
}

async fn update_status(
    conn: &mut sqlx::PgConnection,
    withdrawal_id: Uuid,
    status: WithdrawalStatus,
) -> Result<Withdrawal, AppError> {
    let updated = sqlx::query_as::<_, Withdrawal>(
        "UPDATE withdrawals SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(status)
    .bind(withdrawal_id)
    .fetch_one(conn)
    .await?;
    Ok(updated)
}

/// Request a withdrawal, holding the full amount from the caller's balance.
///
/// # Errors
///
/// - `Validation`: amount fractional or outside the configured bounds, or the bank is inactive
/// - `NotFound`: the bank account doesn't exist or belongs to someone else
/// - `InsufficientFunds`: balance is lower than the amount
pub async fn create(
    pool: &DbPool,
    config: &Config,
    user_id: Uuid,
    req: CreateWithdrawalRequest,
) -> Result<WithdrawalSummary, AppError> {
    let quote = WithdrawalQuote::new(
        req.amount_cents,
        config.withdraw_min_cents,
        config.withdraw_max_cents,
        config.withdraw_charge_bps,
    )?;

    let account = account_for_user(pool, user_id, req.bank_account_id).await?;
    if account.bank_status != RecordStatus::Active {
        return Err(AppError::Validation(format!(
            "{} is not accepting withdrawals",
            account.bank_name
        )));
    }

    let order_id = generate_order_id("WD");
    let mut tx = pool.begin().await?;

    ledger::debit(&mut tx, user_id, quote.amount_cents).await?;

    let withdrawal = sqlx::query_as::<_, Withdrawal>(
        r#"
        INSERT INTO withdrawals (
            user_id, bank_account_id, amount_cents, charge_cents,
            final_amount_cents, order_id, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, 'Pending')
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(account.id)
    .bind(quote.amount_cents)
    .bind(quote.charge_cents)
    .bind(quote.final_amount_cents)
    .bind(&order_id)
    .fetch_one(&mut *tx)
    .await?;

    ledger::record(
        &mut tx,
        &NewTransaction {
            user_id,
            amount_cents: quote.amount_cents,
            charge_cents: quote.charge_cents,
            order_id: order_id.clone(),
            flow: TransactionFlow::Credit,
            kind: TransactionType::Withdrawal,
            message: Some(format!("Withdrawal to {}", account.bank_name)),
            status: TransactionStatus::Pending,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user_id,
        withdrawal_id = %withdrawal.id,
        order_id = %order_id,
        amount_cents = quote.amount_cents,
        "withdrawal requested"
    );

    Ok(WithdrawalSummary {
        id: withdrawal.id,
        order_id: withdrawal.order_id,
        amount_cents: withdrawal.amount_cents,
        charge_cents: withdrawal.charge_cents,
        final_amount_cents: withdrawal.final_amount_cents,
        bank_name: account.bank_name,
        account_name: account.account_name,
        account_number: mask_account_number(&account.account_number),
        status: withdrawal.status,
        created_at: withdrawal.created_at,
    })
}

/// A payout attempt holding the right to record its outcome.
#[derive(Debug, Clone)]
pub struct PayoutClaim {
    pub withdrawal: Withdrawal,
    pub attempt_id: Uuid,
}

/// Claim the payout of a Processing withdrawal.
///
/// Returns `None` when the withdrawal isn't Processing or another attempt
/// claimed it less than `stale_after` ago. Concurrent claims serialize on
/// the row lock taken by the UPDATE, so at most one of them wins.
async fn claim_attempt(
    conn: &mut sqlx::PgConnection,
    withdrawal_id: Uuid,
    stale_after: Duration,
) -> Result<Option<PayoutClaim>, AppError> {
    let attempt_id = Uuid::new_v4();

    let claimed = sqlx::query_as::<_, Withdrawal>(
        r#"
        UPDATE withdrawals
        SET payout_attempt_id = $2, payout_attempted_at = NOW(), updated_at = NOW()
        WHERE id = $1
          AND status = 'Processing'
          AND (payout_attempted_at IS NULL
               OR payout_attempted_at < NOW() - make_interval(secs => $3))
        RETURNING *
        "#,
    )
    .bind(withdrawal_id)
    .bind(attempt_id)
    .bind(stale_after.as_secs_f64())
    .fetch_optional(conn)
    .await?;

    Ok(claimed.map(|withdrawal| PayoutClaim {
        withdrawal,
        attempt_id,
    }))
}

/// Claim a payout or explain why it can't be claimed.
///
/// # Errors
///
/// - `NotFound`: unknown withdrawal
/// - `Conflict`: not Processing, or a payout attempt is already in flight
pub async fn claim_payout(
    pool: &DbPool,
    withdrawal_id: Uuid,
    stale_after: Duration,
) -> Result<PayoutClaim, AppError> {
    let mut conn = pool.acquire().await?;
    if let Some(claim) = claim_attempt(&mut conn, withdrawal_id, stale_after).await? {
        return Ok(claim);
    }

    let current = sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = $1")
        .bind(withdrawal_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("Withdrawal"))?;

    if current.status != WithdrawalStatus::Processing {
        return Err(AppError::Conflict(format!(
            "withdrawal is {:?}, not Processing",
            current.status
        )));
    }
    Err(AppError::Conflict(
        "A payout for this withdrawal is already in flight".to_string(),
    ))
}

/// Approve a Pending withdrawal.
///
/// Without auto payout the withdrawal is paid by hand and goes straight to
/// Success. With it, the withdrawal moves to Processing, the first payout
/// attempt is claimed in the same transaction and submitted in the background.
pub async fn approve(
    pool: &DbPool,
    gateway: &Arc<dyn PaymentGateway>,
    config: &Config,
    withdrawal_id: Uuid,
) -> Result<Withdrawal, AppError> {
    let mut tx = pool.begin().await?;

    let withdrawal = lock_withdrawal(&mut tx, withdrawal_id).await?;
    withdrawal.status.ensure_pending("approved")?;

    if !config.auto_withdraw {
        let updated = update_status(&mut tx, withdrawal_id, WithdrawalStatus::Success).await?;
        ledger::set_status(&mut tx, &withdrawal.order_id, TransactionStatus::Success).await?;
        tx.commit().await?;

        tracing::info!(withdrawal_id = %withdrawal_id, "withdrawal approved for manual transfer");
        return Ok(updated);
    }

    let budget = Duration::from_secs(config.payout_timeout_secs);
    update_status(&mut tx, withdrawal_id, WithdrawalStatus::Processing).await?;
    let claim = claim_attempt(&mut tx, withdrawal_id, budget)
        .await?
        .ok_or_else(|| {
            AppError::Conflict("A payout for this withdrawal is already in flight".to_string())
        })?;
    tx.commit().await?;

    tracing::info!(withdrawal_id = %withdrawal_id, "withdrawal approved, payout queued");
    let updated = claim.withdrawal.clone();
    spawn_payout(pool, gateway, claim, budget);

    Ok(updated)
}

/// Re-submit the payout of a withdrawal stuck in Processing.
///
/// Refused with `Conflict` while an earlier attempt is still calling the
/// gateway.
pub async fn retry_payout(
    pool: &DbPool,
    gateway: &Arc<dyn PaymentGateway>,
    config: &Config,
    withdrawal_id: Uuid,
) -> Result<Withdrawal, AppError> {
    let budget = Duration::from_secs(config.payout_timeout_secs);
    let claim = claim_payout(pool, withdrawal_id, budget).await?;

    tracing::info!(
        withdrawal_id = %withdrawal_id,
        attempt_id = %claim.attempt_id,
        "payout retry queued"
    );
    let withdrawal = claim.withdrawal.clone();
    spawn_payout(pool, gateway, claim, budget);

    Ok(withdrawal)
}

fn spawn_payout(
    pool: &DbPool,
    gateway: &Arc<dyn PaymentGateway>,
    claim: PayoutClaim,
    budget: Duration,
) {
    let pool = pool.clone();
    let gateway = Arc::clone(gateway);
    let withdrawal_id = claim.withdrawal.id;

    tokio::spawn(async move {
        if let Err(e) = submit_payout(&pool, gateway.as_ref(), claim, budget).await {
            tracing::error!(withdrawal_id = %withdrawal_id, error = %e, "payout task failed");
        }
    });
}

/// Claim and submit the payout of a Processing withdrawal.
pub async fn process_payout(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    withdrawal_id: Uuid,
    budget: Duration,
) -> Result<PayoutOutcome, AppError> {
    let claim = claim_payout(pool, withdrawal_id, budget).await?;
    submit_payout(pool, gateway, claim, budget).await
}

/// Send a claimed payout to the gateway and record the outcome.
pub async fn submit_payout(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    claim: PayoutClaim,
    budget: Duration,
) -> Result<PayoutOutcome, AppError> {
    let withdrawal = &claim.withdrawal;
    let account = account_for_user(pool, withdrawal.user_id, withdrawal.bank_account_id).await?;
    let settings = settings_service::load(pool).await?;
    let destination = route_payout(
        settings.as_ref(),
        withdrawal.user_id,
        withdrawal.amount_cents,
        &account,
    );

    let request = PayoutRequest {
        reference_id: withdrawal.order_id.clone(),
        amount_cents: withdrawal.final_amount_cents,
        destination,
        description: format!("Withdrawal {}", withdrawal.order_id),
    };

    let result = tokio::time::timeout(budget, gateway.create_payout(&request))
        .await
        .ok();
    let outcome = PayoutOutcome::classify(result);

    match &outcome {
        PayoutOutcome::Paid => {
            finish_payout(pool, &claim, WithdrawalStatus::Success).await?;
            tracing::info!(withdrawal_id = %withdrawal.id, "payout completed");
        }
        PayoutOutcome::Refused(reason) => {
            finish_payout(pool, &claim, WithdrawalStatus::Failed).await?;
            tracing::error!(withdrawal_id = %withdrawal.id, reason = %reason, "payout refused");
        }
        PayoutOutcome::Indeterminate(reason) => {
            release_attempt(pool, &claim).await?;
            tracing::warn!(
                withdrawal_id = %withdrawal.id,
                reason = %reason,
                "payout outcome unknown, withdrawal left Processing"
            );
        }
    }

    Ok(outcome)
}

/// Let a later retry claim the payout once this attempt has stopped waiting.
async fn release_attempt(pool: &DbPool, claim: &PayoutClaim) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE withdrawals
        SET payout_attempted_at = NULL, updated_at = NOW()
        WHERE id = $1 AND payout_attempt_id = $2 AND status = 'Processing'
        "#,
    )
    .bind(claim.withdrawal.id)
    .bind(claim.attempt_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Move a Processing withdrawal and its ledger entry to a final status.
///
/// Only the attempt holding the claim may do this.
async fn finish_payout(
    pool: &DbPool,
    claim: &PayoutClaim,
    status: WithdrawalStatus,
) -> Result<(), AppError> {
    let ledger_status = match status {
        WithdrawalStatus::Success => TransactionStatus::Success,
        _ => TransactionStatus::Failed,
    };
    let withdrawal = &claim.withdrawal;

    let mut tx = pool.begin().await?;

    let changed = sqlx::query(
        r#"
        UPDATE withdrawals
        SET status = $1, payout_attempted_at = NULL, updated_at = NOW()
        WHERE id = $2 AND status = 'Processing' AND payout_attempt_id = $3
        "#,
    )
    .bind(status)
    .bind(withdrawal.id)
    .bind(claim.attempt_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if changed == 0 {
        tracing::warn!(
            withdrawal_id = %withdrawal.id,
            attempt_id = %claim.attempt_id,
            "payout claim was superseded while the payout ran, outcome not recorded"
        );
        return Ok(());
    }

    ledger::set_status(&mut tx, &withdrawal.order_id, ledger_status).await?;
    tx.commit().await?;
    Ok(())
}

/// Reject a Pending withdrawal and refund the held amount.
pub async fn reject(pool: &DbPool, withdrawal_id: Uuid) -> Result<Withdrawal, AppError> {
    let mut tx = pool.begin().await?;

    let withdrawal = lock_withdrawal(&mut tx, withdrawal_id).await?;
    withdrawal.status.ensure_pending("rejected")?;

    let updated = update_status(&mut tx, withdrawal_id, WithdrawalStatus::Failed).await?;
    ledger::set_status(&mut tx, &withdrawal.order_id, TransactionStatus::Failed).await?;

    ledger::credit(&mut tx, withdrawal.user_id, withdrawal.amount_cents).await?;
    ledger::record(
        &mut tx,
        &NewTransaction {
            user_id: withdrawal.user_id,
            amount_cents: withdrawal.amount_cents,
            charge_cents: 0,
            order_id: generate_order_id("RFD"),
            flow: TransactionFlow::Debit,
            kind: TransactionType::Refund,
            message: Some(format!("Refund of withdrawal {}", withdrawal.order_id)),
            status: TransactionStatus::Success,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        withdrawal_id = %withdrawal_id,
        user_id = %withdrawal.user_id,
        amount_cents = withdrawal.amount_cents,
        "withdrawal rejected and refunded"
    );

    Ok(updated)
}

/// Apply a gateway payout callback.
///
/// # Errors
///
/// - `NotFound`: a failure callback names an unknown order ID
pub async fn settle_payout(
    pool: &DbPool,
    callback: &PayoutCallback,
) -> Result<PayoutCallbackOutcome, AppError> {
    if callback.success {
        tracing::info!(order_id = %callback.order_id, "payout success callback ignored");
        return Ok(PayoutCallbackOutcome::Ignored);
    }

    let mut tx = pool.begin().await?;

    let withdrawal = sqlx::query_as::<_, Withdrawal>(
        "SELECT * FROM withdrawals WHERE order_id = $1 FOR UPDATE",
    )
    .bind(&callback.order_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Withdrawal"))?;

    if withdrawal.status != WithdrawalStatus::Processing {
        tracing::info!(
            order_id = %callback.order_id,
            status = ?withdrawal.status,
            "payout failure callback for a withdrawal not in Processing"
        );
        return Ok(PayoutCallbackOutcome::Unchanged);
    }

    sqlx::query(
        r#"
        UPDATE withdrawals
        SET status = 'Pending', payout_attempted_at = NULL, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(withdrawal.id)
    .execute(&mut *tx)
    .await?;
    ledger::set_status(&mut tx, &withdrawal.order_id, TransactionStatus::Pending).await?;
    tx.commit().await?;

    tracing::warn!(
        order_id = %callback.order_id,
        withdrawal_id = %withdrawal.id,
        "payout failed at gateway, withdrawal back to Pending"
    );

    Ok(PayoutCallbackOutcome::Reverted)
}

const LIST_SELECT: &str = r#"
    SELECT w.id, w.user_id, u.name AS user_name, u.number AS phone,
           w.bank_account_id, w.amount_cents, w.charge_cents, w.final_amount_cents,
           w.order_id, w.status, w.created_at,
           ba.account_name, ba.account_number,
           b.name AS bank_name, b.code AS bank_code, b.status AS bank_status
    FROM withdrawals w
    JOIN users u ON u.id = w.user_id
    JOIN bank_accounts ba ON ba.id = w.bank_account_id
    JOIN banks b ON b.id = ba.bank_id
"#;

/// The caller's withdrawals with their real destination account.
pub async fn list_for_user(
    pool: &DbPool,
    user_id: Uuid,
    page: &Pagination,
) -> Result<Vec<WithdrawalListItem>, AppError> {
    let sql = format!(
        "{} WHERE w.user_id = $1 ORDER BY w.created_at DESC LIMIT $2 OFFSET $3",
        LIST_SELECT
    );

    let rows = sqlx::query_as::<_, WithdrawalListRow>(&sql)
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(WithdrawalListItem::from).collect())
}

/// Admin listing with payout routing applied to each destination.
pub async fn admin_list(
    pool: &DbPool,
    filter: &WithdrawalFilter,
    page: &Pagination,
) -> Result<Vec<AdminWithdrawalItem>, AppError> {
    let sql = format!(
        r#"{}
        WHERE ($1::withdrawal_status IS NULL OR w.status = $1)
          AND ($2::UUID IS NULL OR w.user_id = $2)
          AND ($3::TEXT IS NULL OR w.order_id ILIKE '%' || $3 || '%')
        ORDER BY w.created_at DESC
        LIMIT $4 OFFSET $5
        "#,
        LIST_SELECT
    );

    let rows = sqlx::query_as::<_, WithdrawalListRow>(&sql)
        .bind(filter.status)
        .bind(filter.user_id)
        .bind(filter.search.as_deref().filter(|s| !s.is_empty()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

    let settings = settings_service::load(pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let dest = route_payout(settings.as_ref(), row.user_id, row.amount_cents, &row.account());
            AdminWithdrawalItem {
                id: row.id,
                user_id: row.user_id,
                user_name: row.user_name,
                phone: row.phone,
                bank_account_id: row.bank_account_id,
                bank_name: dest.bank_name,
                account_name: dest.account_name,
                account_number: dest.account_number,
                amount_cents: row.amount_cents,
                charge_cents: row.charge_cents,
                final_amount_cents: row.final_amount_cents,
                order_id: row.order_id,
                status: row.status,
                created_at: row.created_at,
            }
        })
        .collect())
}
