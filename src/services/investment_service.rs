//! Investment service - purchase, payment settlement and admin overrides.
//!
//! # Purchase
//!
//! The gateway charge is created before anything is written, so a gateway
//! failure leaves no rows behind. The investment, its payment and a Pending
//! `investment` ledger entry are then inserted in one transaction.
//!
//! # Settlement
//!
//! Payment callbacks lock the investment and act only while it is Pending.
//! A replayed callback therefore finds a Running or Cancelled investment
//! and changes nothing.

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    gateway::{ChargeRequest, PaymentCallback, PaymentGateway},
    models::{
        Pagination,
        investment::{
            AdminInvestmentRow, CreateInvestmentRequest, CreateInvestmentResponse, Investment,
            InvestmentFilter, InvestmentStatus, return_interval,
        },
        payment::{Payment, PaymentDetailResponse, PaymentMethod, PaymentStatus},
        product::{HIGHER_TIER_PREREQUISITE_CENTS, Product},
        transaction::{
            NewTransaction, TransactionFlow, TransactionStatus, TransactionType, generate_order_id,
        },
        user::{INVESTMENT_STATUS_ACTIVE, User},
    },
    money,
    services::{
        ledger,
        referral::{self, BonusVariant},
    },
};

/// What a payment callback did to its investment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Confirmed,
    Cancelled,
    /// The investment had already left Pending
    Ignored,
}

/// Register a purchase and open a gateway charge for it.
///
/// # Errors
///
/// - `Validation`: unknown payment method/channel, fractional amount, amount outside
///   the product bounds, or too small to earn a daily return
/// - `NotFound`: product missing or inactive, or user missing
/// - `Ineligible`: tier 2/3 product without the tier-1 prerequisite
/// - `Gateway`: the charge could not be created (nothing is persisted)
pub async fn create(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    user_id: Uuid,
    req: CreateInvestmentRequest,
) -> Result<CreateInvestmentResponse, AppError> {
    let method = PaymentMethod::parse(&req.payment_method, &req.payment_channel)?;

    if !money::is_whole_units(req.amount_cents) {
        return Err(AppError::Validation(
            "Investment amount must be a whole number".to_string(),
        ));
    }

    let product = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = $1 AND status = 'Active'",
    )
    .bind(req.product_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Product"))?;

    if !product.accepts_amount(req.amount_cents) {
        return Err(AppError::Validation(format!(
            "Amount must be between {} and {}",
            money::format_cents(product.minimum_cents),
            money::format_cents(product.maximum_cents)
        )));
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    if product.requires_prerequisite() && user.total_invest_cents < HIGHER_TIER_PREREQUISITE_CENTS {
        return Err(AppError::Ineligible(format!(
            "{} requires a confirmed investment of at least {} first",
            product.name,
            money::format_cents(HIGHER_TIER_PREREQUISITE_CENTS)
        )));
    }

    let daily_profit_cents =
        money::daily_profit(req.amount_cents, product.percentage_bps, product.duration);
    if daily_profit_cents <= 0 {
        return Err(AppError::Validation(
            "Amount is too small to earn a daily return".to_string(),
        ));
    }

    let order_id = generate_order_id("INV");
    let charge = gateway
        .create_charge(&ChargeRequest {
            reference_id: order_id.clone(),
            amount_cents: req.amount_cents,
            method: method.clone(),
        })
        .await?;

    let mut tx = pool.begin().await?;

    let investment = sqlx::query_as::<_, Investment>(
        r#"
        INSERT INTO investments (
            user_id, product_id, product_tier, amount_cents, percentage_bps,
            duration, daily_profit_cents, order_id, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'Pending')
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(product.id)
    .bind(product.tier)
    .bind(req.amount_cents)
    .bind(product.percentage_bps)
    .bind(product.duration)
    .bind(daily_profit_cents)
    .bind(&order_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO payments (
            investment_id, order_id, payment_method, payment_channel,
            payment_code, payment_link, status, expired_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, 'Pending', $7)
        "#,
    )
    .bind(investment.id)
    .bind(&order_id)
    .bind(method.method_name())
    .bind(method.channel())
    .bind(&charge.payment_code)
    .bind(&charge.payment_link)
    .bind(charge.expires_at)
    .execute(&mut *tx)
    .await?;

    ledger::record(
        &mut tx,
        &NewTransaction {
            user_id,
            amount_cents: req.amount_cents,
            charge_cents: 0,
            order_id: order_id.clone(),
            flow: TransactionFlow::Credit,
            kind: TransactionType::Investment,
            message: Some(format!("Investment in {}", product.name)),
            status: TransactionStatus::Pending,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user_id,
        investment_id = %investment.id,
        order_id = %order_id,
        amount_cents = req.amount_cents,
        "investment created"
    );

    Ok(CreateInvestmentResponse {
        order_id,
        amount_cents: investment.amount_cents,
        product: product.name,
        percentage_bps: investment.percentage_bps,
        duration: investment.duration,
        daily_profit_cents: investment.daily_profit_cents,
        status: investment.status,
        payment_code: charge.payment_code,
        payment_link: charge.payment_link,
        expired_at: Some(charge.expires_at),
    })
}

/// Apply a gateway payment callback to the matching investment.
///
/// # Errors
///
/// - `NotFound`: no payment carries the callback's order ID
pub async fn settle_payment(
    pool: &DbPool,
    callback: &PaymentCallback,
) -> Result<SettleOutcome, AppError> {
    let mut tx = pool.begin().await?;

    let payment = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE order_id = $1 FOR UPDATE",
    )
    .bind(&callback.order_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Payment"))?;

    let investment = sqlx::query_as::<_, Investment>(
        "SELECT * FROM investments WHERE id = $1 FOR UPDATE",
    )
    .bind(payment.investment_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Investment"))?;

    if !investment.status.awaits_payment() {
        tracing::info!(
            order_id = %callback.order_id,
            status = ?investment.status,
            "payment callback ignored, investment already settled"
        );
        return Ok(SettleOutcome::Ignored);
    }

    let payment_status = if callback.success {
        PaymentStatus::Success
    } else {
        PaymentStatus::Failed
    };

    sqlx::query(
        r#"
        UPDATE payments
        SET status = $1,
            reference_id = COALESCE($2, reference_id),
            updated_at = NOW()
        WHERE id = $3
        "#,
    )
    .bind(payment_status)
    .bind(&callback.gateway_id)
    .bind(payment.id)
    .execute(&mut *tx)
    .await?;

    let outcome = if callback.success {
        confirm(&mut tx, &investment).await?;
        SettleOutcome::Confirmed
    } else {
        cancel(&mut tx, &investment).await?;
        SettleOutcome::Cancelled
    };

    tx.commit().await?;

    tracing::info!(
        order_id = %callback.order_id,
        investment_id = %investment.id,
        outcome = ?outcome,
        "payment callback applied"
    );

    Ok(outcome)
}

/// Pending -> Running, crediting the owner's totals and paying referral bonuses.
async fn confirm(conn: &mut PgConnection, investment: &Investment) -> Result<(), AppError> {
    let now = Utc::now();

    ledger::set_status(conn, &investment.order_id, TransactionStatus::Success).await?;

    sqlx::query(
        r#"
        UPDATE investments
        SET status = 'Running',
            next_return_at = $1,
            last_return_at = NULL,
            updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(now + return_interval())
    .bind(investment.id)
    .execute(&mut *conn)
    .await?;

    let owner = ledger::lock_user(conn, investment.user_id).await?;
    let level = owner.effective_level().max(investment.product_tier);

    sqlx::query(
        r#"
        UPDATE users
        SET total_invest_cents = total_invest_cents + $1,
            investment_status = $2,
            level = GREATEST(COALESCE(level, 0), $3),
            updated_at = NOW()
        WHERE id = $4
        "#,
    )
    .bind(investment.amount_cents)
    .bind(INVESTMENT_STATUS_ACTIVE)
    .bind(investment.product_tier)
    .bind(owner.id)
    .execute(&mut *conn)
    .await?;

    referral::distribute(
        conn,
        BonusVariant::Confirmation,
        owner.reff_by,
        level,
        investment.amount_cents,
    )
    .await?;

    Ok(())
}

/// Pending -> Cancelled. Nothing was debited for the purchase, so nothing is refunded.
async fn cancel(conn: &mut PgConnection, investment: &Investment) -> Result<(), AppError> {
    ledger::set_status(conn, &investment.order_id, TransactionStatus::Failed).await?;

    sqlx::query("UPDATE investments SET status = 'Cancelled', updated_at = NOW() WHERE id = $1")
        .bind(investment.id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Admin status override. Never touches balances.
pub async fn admin_set_status(
    pool: &DbPool,
    investment_id: Uuid,
    target: &str,
) -> Result<Investment, AppError> {
    let target = InvestmentStatus::parse_admin_target(target)?;
    let mut tx = pool.begin().await?;

    let investment = sqlx::query_as::<_, Investment>(
        "SELECT * FROM investments WHERE id = $1 FOR UPDATE",
    )
    .bind(investment_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Investment"))?;

    let change = investment.admin_override(target, Utc::now());

    let updated = sqlx::query_as::<_, Investment>(
        r#"
        UPDATE investments
        SET status = $1,
            next_return_at = $2,
            updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(change.status)
    .bind(change.next_return_at)
    .bind(investment_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        investment_id = %investment_id,
        from = ?investment.status,
        to = ?updated.status,
        "investment status overridden"
    );

    Ok(updated)
}

pub async fn list_for_user(
    pool: &DbPool,
    user_id: Uuid,
    page: &Pagination,
) -> Result<Vec<Investment>, AppError> {
    let rows = sqlx::query_as::<_, Investment>(
        r#"
        SELECT * FROM investments
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetch one of the caller's investments. Other users' investments are reported as missing.
pub async fn get_for_user(
    pool: &DbPool,
    user_id: Uuid,
    investment_id: Uuid,
) -> Result<Investment, AppError> {
    sqlx::query_as::<_, Investment>("SELECT * FROM investments WHERE id = $1 AND user_id = $2")
        .bind(investment_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Investment"))
}

/// Running, Completed and Suspended investments keyed by active product name.
///
/// Every active product appears, with an empty list when the caller holds none of it.
pub async fn active_by_product(
    pool: &DbPool,
    user_id: Uuid,
) -> Result<BTreeMap<String, Vec<Investment>>, AppError> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE status = 'Active' ORDER BY tier, name",
    )
    .fetch_all(pool)
    .await?;

    let investments = sqlx::query_as::<_, Investment>(
        "SELECT * FROM investments WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut grouped: BTreeMap<String, Vec<Investment>> = BTreeMap::new();
    for product in products {
        let held = investments
            .iter()
            .filter(|i| i.product_id == product.id && i.status.is_visible_as_active())
            .cloned()
            .collect();
        grouped.insert(product.name, held);
    }

    Ok(grouped)
}

/// Payment detail for one of the caller's orders.
pub async fn payment_detail(
    pool: &DbPool,
    user_id: Uuid,
    order_id: &str,
) -> Result<PaymentDetailResponse, AppError> {
    sqlx::query_as::<_, PaymentDetailResponse>(
        r#"
        SELECT pr.name AS product,
               p.order_id,
               i.amount_cents,
               p.payment_code,
               p.payment_channel,
               p.payment_method,
               p.payment_link,
               p.expired_at,
               p.status
        FROM payments p
        JOIN investments i ON i.id = p.investment_id
        JOIN products pr ON pr.id = i.product_id
        WHERE p.order_id = $1 AND i.user_id = $2
        "#,
    )
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Payment"))
}

const ADMIN_SELECT: &str = r#"
    SELECT i.id, i.user_id, u.name AS user_name, u.number AS phone,
           i.product_id, pr.name AS product_name, i.amount_cents, i.duration,
           i.daily_profit_cents, i.total_paid, i.total_returned_cents,
           i.last_return_at, i.next_return_at, i.order_id, i.status, i.created_at
    FROM investments i
    JOIN users u ON u.id = i.user_id
    JOIN products pr ON pr.id = i.product_id
"#;

pub async fn admin_list(
    pool: &DbPool,
    filter: &InvestmentFilter,
    page: &Pagination,
) -> Result<Vec<AdminInvestmentRow>, AppError> {
    let sql = format!(
        r#"{}
        WHERE ($1::investment_status IS NULL OR i.status = $1)
          AND ($2::UUID IS NULL OR i.product_id = $2)
          AND ($3::TEXT IS NULL OR i.order_id ILIKE '%' || $3 || '%')
        ORDER BY i.created_at DESC
        LIMIT $4 OFFSET $5
        "#,
        ADMIN_SELECT
    );

    let rows = sqlx::query_as::<_, AdminInvestmentRow>(&sql)
        .bind(filter.status)
        .bind(filter.product_id)
        .bind(filter.search.as_deref().filter(|s| !s.is_empty()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

pub async fn admin_get(pool: &DbPool, investment_id: Uuid) -> Result<AdminInvestmentRow, AppError> {
    let sql = format!("{} WHERE i.id = $1", ADMIN_SELECT);
    sqlx::query_as::<_, AdminInvestmentRow>(&sql)
        .bind(investment_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Investment"))
}
