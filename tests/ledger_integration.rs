//! End-to-end ledger tests against PostgreSQL.
//!
//! Run with `DATABASE_URL` pointing at a scratch database:
//! `cargo test --test ledger_integration -- --ignored`

mod common;

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use common::MockGateway;
use invest_ledger_server::{
    error::AppError,
    gateway::{GatewayError, PaymentCallback, PayoutCallback},
    models::{
        investment::{CreateInvestmentRequest, InvestmentStatus},
        settings::UpdatePaymentSettingsRequest,
        withdrawal::{CreateWithdrawalRequest, WithdrawalStatus},
    },
    services::{
        investment_service::{self, SettleOutcome},
        scheduler, settings_service,
        withdrawal_service::{self, PayoutCallbackOutcome, PayoutOutcome},
    },
};
use serial_test::serial;
use sqlx::PgPool;
use uuid::Uuid;

async fn insert_user(pool: &PgPool, reff_by: Option<Uuid>, level: Option<i32>, balance: i64) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO users (name, number, reff_by, level, balance_cents)
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind("Test User")
    .bind(format!("08{}", Uuid::new_v4().simple()))
    .bind(reff_by)
    .bind(level)
    .bind(balance)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Product{min: 50 000.00, max: 500 000.00, 30%, 30 days}
async fn insert_product(pool: &PgPool, tier: i32) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO products (name, tier, minimum_cents, maximum_cents, percentage_bps, duration)
         VALUES ($1, $2, 5000000, 50000000, 3000, 30) RETURNING id",
    )
    .bind(format!("Tier {} {}", tier, Uuid::new_v4().simple()))
    .bind(tier)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// A Running investment due at `due`, paying 13 000.00 per day.
async fn insert_running_investment(pool: &PgPool, user_id: Uuid, duration: i32, due: chrono::DateTime<Utc>) -> Uuid {
    let product_id = insert_product(pool, 1).await;
    sqlx::query_scalar(
        "INSERT INTO investments (
            user_id, product_id, product_tier, amount_cents, percentage_bps, duration,
            daily_profit_cents, order_id, status, next_return_at
         )
         VALUES ($1, $2, 1, 30000000, 3000, $3, 1300000, $4, 'Running', $5)
         RETURNING id",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(duration)
    .bind(format!("INV-{}", Uuid::new_v4().simple()))
    .bind(due)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn insert_bank_account(pool: &PgPool, user_id: Uuid, bank_active: bool) -> Uuid {
    let bank_id: Uuid = sqlx::query_scalar(
        "INSERT INTO banks (name, code, status) VALUES ('Bank Central Asia', $1, $2::record_status) RETURNING id",
    )
    .bind(format!("BCA{}", &Uuid::new_v4().simple().to_string()[..6]))
    .bind(if bank_active { "Active" } else { "Inactive" })
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query_scalar(
        "INSERT INTO bank_accounts (user_id, bank_id, account_name, account_number)
         VALUES ($1, $2, 'Siti Rahma', '1234567890') RETURNING id",
    )
    .bind(user_id)
    .bind(bank_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn balance(pool: &PgPool, user_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT balance_cents FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn count_entries(pool: &PgPool, user_id: Uuid, kind: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE user_id = $1 AND transaction_type = $2")
        .bind(user_id)
        .bind(kind)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn entry_status(pool: &PgPool, order_id: &str) -> String {
    sqlx::query_scalar("SELECT status::TEXT FROM transactions WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn withdrawal_status(pool: &PgPool, withdrawal_id: Uuid) -> WithdrawalStatus {
    sqlx::query_scalar("SELECT status FROM withdrawals WHERE id = $1")
        .bind(withdrawal_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn purchase(product_id: Uuid, amount_cents: i64) -> CreateInvestmentRequest {
    CreateInvestmentRequest {
        product_id,
        amount_cents,
        payment_method: "BANK".to_string(),
        payment_channel: "BCA".to_string(),
    }
}

// ============================================================================
// Investment Confirmation Tests
// ============================================================================

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn confirmation_is_applied_exactly_once() {
    let pool = common::setup_test_db().await;
    let gateway = MockGateway::new();

    let referrer = insert_user(&pool, None, None, 0).await;
    let investor = insert_user(&pool, Some(referrer), None, 0).await;
    let product = insert_product(&pool, 1).await;

    let created = investment_service::create(&pool, &gateway, investor, purchase(product, 30_000_000))
        .await
        .unwrap();
    assert_eq!(created.daily_profit_cents, 1_300_000);
    assert_eq!(created.status, InvestmentStatus::Pending);
    assert_eq!(gateway.charge_count(), 1);
    assert_eq!(entry_status(&pool, &created.order_id).await, "Pending");

    let callback = PaymentCallback {
        order_id: created.order_id.clone(),
        gateway_id: Some("KP-1".to_string()),
        success: true,
    };
    let first = investment_service::settle_payment(&pool, &callback).await.unwrap();
    let replay = investment_service::settle_payment(&pool, &callback).await.unwrap();
    assert_eq!(first, SettleOutcome::Confirmed);
    assert_eq!(replay, SettleOutcome::Ignored);

    let (total_invest, level, status): (i64, Option<i32>, String) = sqlx::query_as(
        "SELECT total_invest_cents, level, investment_status FROM users WHERE id = $1",
    )
    .bind(investor)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(total_invest, 30_000_000);
    assert_eq!(level, Some(1));
    assert_eq!(status, "Active");

    // 10% once, plus a spin ticket for a purchase of at least 100 000.00
    assert_eq!(balance(&pool, referrer).await, 3_000_000);
    assert_eq!(count_entries(&pool, referrer, "referral_bonus").await, 1);
    let spins: Option<i32> = sqlx::query_scalar("SELECT spin_ticket FROM users WHERE id = $1")
        .bind(referrer)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(spins, Some(1));

    assert_eq!(entry_status(&pool, &created.order_id).await, "Success");
    let reference: Option<String> =
        sqlx::query_scalar("SELECT reference_id FROM payments WHERE order_id = $1")
            .bind(&created.order_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(reference.as_deref(), Some("KP-1"));
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn failed_payment_cancels_and_later_success_is_ignored() {
    let pool = common::setup_test_db().await;
    let gateway = MockGateway::new();

    let investor = insert_user(&pool, None, None, 0).await;
    let product = insert_product(&pool, 1).await;
    let created = investment_service::create(&pool, &gateway, investor, purchase(product, 10_000_000))
        .await
        .unwrap();

    let failed = PaymentCallback {
        order_id: created.order_id.clone(),
        gateway_id: None,
        success: false,
    };
    assert_eq!(
        investment_service::settle_payment(&pool, &failed).await.unwrap(),
        SettleOutcome::Cancelled
    );

    let late_success = PaymentCallback {
        success: true,
        ..failed
    };
    assert_eq!(
        investment_service::settle_payment(&pool, &late_success).await.unwrap(),
        SettleOutcome::Ignored
    );

    let total_invest: i64 = sqlx::query_scalar("SELECT total_invest_cents FROM users WHERE id = $1")
        .bind(investor)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(total_invest, 0);
    assert_eq!(entry_status(&pool, &created.order_id).await, "Failed");
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn higher_tier_requires_prerequisite_before_any_charge() {
    let pool = common::setup_test_db().await;
    let gateway = MockGateway::new();

    let investor = insert_user(&pool, None, None, 0).await;
    let product = insert_product(&pool, 2).await;

    let err = investment_service::create(&pool, &gateway, investor, purchase(product, 10_000_000))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Ineligible(_)));
    assert_eq!(gateway.charge_count(), 0);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM investments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn unknown_payment_order_is_not_found() {
    let pool = common::setup_test_db().await;
    let callback = PaymentCallback {
        order_id: "INV-MISSING".to_string(),
        gateway_id: None,
        success: true,
    };
    let err = investment_service::settle_payment(&pool, &callback)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============================================================================
// Daily Return Tests
// ============================================================================

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn five_day_investment_pays_five_times_then_completes() {
    let pool = common::setup_test_db().await;
    let investor = insert_user(&pool, None, Some(1), 0).await;
    let start = Utc::now();
    let investment = insert_running_investment(&pool, investor, 5, start).await;

    for day in 0..5 {
        let processed = scheduler::run_daily_returns(&pool, start + Duration::hours(24 * day))
            .await
            .unwrap();
        assert_eq!(processed, 1, "day {}", day);
    }

    let sixth = scheduler::run_daily_returns(&pool, start + Duration::days(10))
        .await
        .unwrap();
    assert_eq!(sixth, 0);

    let (total_paid, returned, status): (i32, i64, InvestmentStatus) = sqlx::query_as(
        "SELECT total_paid, total_returned_cents, status FROM investments WHERE id = $1",
    )
    .bind(investment)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(total_paid, 5);
    assert_eq!(returned, 5 * 1_300_000);
    assert_eq!(status, InvestmentStatus::Completed);

    assert_eq!(balance(&pool, investor).await, 5 * 1_300_000);
    assert_eq!(count_entries(&pool, investor, "return").await, 5);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn not_yet_due_investment_is_skipped() {
    let pool = common::setup_test_db().await;
    let investor = insert_user(&pool, None, Some(1), 0).await;
    let now = Utc::now();
    insert_running_investment(&pool, investor, 30, now + Duration::hours(1)).await;

    assert_eq!(scheduler::run_daily_returns(&pool, now).await.unwrap(), 0);
    assert_eq!(balance(&pool, investor).await, 0);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn team_bonus_skips_lower_level_ancestor_and_continues() {
    let pool = common::setup_test_db().await;
    let grandparent = insert_user(&pool, None, Some(2), 0).await;
    let parent = insert_user(&pool, Some(grandparent), Some(1), 0).await;
    let investor = insert_user(&pool, Some(parent), Some(2), 0).await;
    let now = Utc::now();
    insert_running_investment(&pool, investor, 30, now).await;

    assert_eq!(scheduler::run_daily_returns(&pool, now).await.unwrap(), 1);

    assert_eq!(balance(&pool, investor).await, 1_300_000);
    assert_eq!(balance(&pool, parent).await, 0);
    assert_eq!(count_entries(&pool, parent, "team").await, 0);
    // Level-2 rate of 2%
    assert_eq!(balance(&pool, grandparent).await, 26_000);
    assert_eq!(count_entries(&pool, grandparent, "team").await, 1);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn root_investor_produces_no_team_bonus() {
    let pool = common::setup_test_db().await;
    let investor = insert_user(&pool, None, Some(1), 0).await;
    let now = Utc::now();
    insert_running_investment(&pool, investor, 30, now).await;

    scheduler::run_daily_returns(&pool, now).await.unwrap();

    let bonuses: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM transactions WHERE transaction_type IN ('team', 'referral_bonus')",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(bonuses, 0);
}

// ============================================================================
// Withdrawal Tests
// ============================================================================

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn rejected_withdrawal_restores_balance() {
    let pool = common::setup_test_db().await;
    let config = common::test_config(false);
    let user = insert_user(&pool, None, None, 20_000_000).await;
    let account = insert_bank_account(&pool, user, true).await;

    let summary = withdrawal_service::create(
        &pool,
        &config,
        user,
        CreateWithdrawalRequest {
            amount_cents: 10_000_000,
            bank_account_id: account,
        },
    )
    .await
    .unwrap();
    assert_eq!(summary.charge_cents, 1_000_000);
    assert_eq!(summary.final_amount_cents, 9_000_000);
    assert_eq!(summary.account_number, "123****890");
    assert_eq!(balance(&pool, user).await, 10_000_000);

    let rejected = withdrawal_service::reject(&pool, summary.id).await.unwrap();
    assert_eq!(rejected.status, WithdrawalStatus::Failed);
    assert_eq!(balance(&pool, user).await, 20_000_000);
    assert_eq!(entry_status(&pool, &summary.order_id).await, "Failed");
    assert_eq!(count_entries(&pool, user, "refund").await, 1);

    let again = withdrawal_service::reject(&pool, summary.id).await.unwrap_err();
    assert!(matches!(again, AppError::Conflict(_)));
    assert_eq!(balance(&pool, user).await, 20_000_000);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn withdrawal_beyond_balance_writes_nothing() {
    let pool = common::setup_test_db().await;
    let config = common::test_config(false);
    let user = insert_user(&pool, None, None, 6_000_000).await;
    let account = insert_bank_account(&pool, user, true).await;

    let err = withdrawal_service::create(
        &pool,
        &config,
        user,
        CreateWithdrawalRequest {
            amount_cents: 10_000_000,
            bank_account_id: account,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds));
    assert_eq!(balance(&pool, user).await, 6_000_000);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM withdrawals")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn inactive_bank_is_refused() {
    let pool = common::setup_test_db().await;
    let config = common::test_config(false);
    let user = insert_user(&pool, None, None, 20_000_000).await;
    let account = insert_bank_account(&pool, user, false).await;

    let err = withdrawal_service::create(
        &pool,
        &config,
        user,
        CreateWithdrawalRequest {
            amount_cents: 10_000_000,
            bank_account_id: account,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(balance(&pool, user).await, 20_000_000);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn manual_approval_settles_immediately() {
    let pool = common::setup_test_db().await;
    let config = common::test_config(false);
    let gateway: std::sync::Arc<dyn invest_ledger_server::gateway::PaymentGateway> =
        std::sync::Arc::new(MockGateway::new());
    let user = insert_user(&pool, None, None, 20_000_000).await;
    let account = insert_bank_account(&pool, user, true).await;

    let summary = withdrawal_service::create(
        &pool,
        &config,
        user,
        CreateWithdrawalRequest {
            amount_cents: 10_000_000,
            bank_account_id: account,
        },
    )
    .await
    .unwrap();

    let approved = withdrawal_service::approve(&pool, &gateway, &config, summary.id)
        .await
        .unwrap();
    assert_eq!(approved.status, WithdrawalStatus::Success);
    assert_eq!(entry_status(&pool, &summary.order_id).await, "Success");
    assert_eq!(balance(&pool, user).await, 10_000_000);
}

/// Create a withdrawal and move it to Processing as an auto approval would.
async fn processing_withdrawal(pool: &PgPool, amount_cents: i64) -> (Uuid, Uuid, String) {
    let config = common::test_config(true);
    let user = insert_user(pool, None, None, 200_000_000).await;
    let account = insert_bank_account(pool, user, true).await;

    let summary = withdrawal_service::create(
        pool,
        &config,
        user,
        CreateWithdrawalRequest {
            amount_cents,
            bank_account_id: account,
        },
    )
    .await
    .unwrap();

    sqlx::query("UPDATE withdrawals SET status = 'Processing' WHERE id = $1")
        .bind(summary.id)
        .execute(pool)
        .await
        .unwrap();

    (user, summary.id, summary.order_id)
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn refused_payout_fails_without_refund() {
    let pool = common::setup_test_db().await;
    let (user, withdrawal, order_id) = processing_withdrawal(&pool, 10_000_000).await;
    let gateway = MockGateway::with_payout_result(Err(GatewayError::Rejected("4030001".into())));

    let outcome =
        withdrawal_service::process_payout(&pool, &gateway, withdrawal, StdDuration::from_secs(5))
            .await
            .unwrap();
    assert!(matches!(outcome, PayoutOutcome::Refused(_)));
    assert_eq!(withdrawal_status(&pool, withdrawal).await, WithdrawalStatus::Failed);
    assert_eq!(entry_status(&pool, &order_id).await, "Failed");
    assert_eq!(balance(&pool, user).await, 190_000_000);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn transport_error_leaves_processing_until_failure_callback() {
    let pool = common::setup_test_db().await;
    let (_user, withdrawal, order_id) = processing_withdrawal(&pool, 10_000_000).await;
    let gateway = MockGateway::with_payout_result(Err(GatewayError::Transport("reset".into())));

    let outcome =
        withdrawal_service::process_payout(&pool, &gateway, withdrawal, StdDuration::from_secs(5))
            .await
            .unwrap();
    assert!(matches!(outcome, PayoutOutcome::Indeterminate(_)));
    assert_eq!(withdrawal_status(&pool, withdrawal).await, WithdrawalStatus::Processing);

    let callback = PayoutCallback {
        order_id: order_id.clone(),
        success: false,
    };
    assert_eq!(
        withdrawal_service::settle_payout(&pool, &callback).await.unwrap(),
        PayoutCallbackOutcome::Reverted
    );
    assert_eq!(withdrawal_status(&pool, withdrawal).await, WithdrawalStatus::Pending);
    assert_eq!(entry_status(&pool, &order_id).await, "Pending");

    // Replay finds it Pending and changes nothing
    assert_eq!(
        withdrawal_service::settle_payout(&pool, &callback).await.unwrap(),
        PayoutCallbackOutcome::Unchanged
    );
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn payout_above_threshold_is_routed_to_settings_account() {
    let pool = common::setup_test_db().await;
    sqlx::query(
        "INSERT INTO payment_settings (id, bank_name, bank_code, account_number, account_name, withdraw_threshold_cents)
         VALUES (1, 'Bank Negara Indonesia', 'BNI', '9990001112', 'Operations', 50000000)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let (_user, withdrawal, order_id) = processing_withdrawal(&pool, 60_000_000).await;
    let gateway = MockGateway::new();

    let outcome =
        withdrawal_service::process_payout(&pool, &gateway, withdrawal, StdDuration::from_secs(5))
            .await
            .unwrap();
    assert_eq!(outcome, PayoutOutcome::Paid);
    assert_eq!(withdrawal_status(&pool, withdrawal).await, WithdrawalStatus::Success);
    assert_eq!(entry_status(&pool, &order_id).await, "Success");

    let payouts = gateway.payouts.lock().unwrap();
    assert_eq!(payouts.len(), 1);
    assert_eq!(payouts[0].destination.bank_code, "BNI");
    assert_eq!(payouts[0].destination.account_number, "9990001112");
    assert_eq!(payouts[0].destination.account_name, "Siti Rahma");
    assert_eq!(payouts[0].amount_cents, 54_000_000);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn concurrent_payout_attempts_submit_once() {
    let pool = common::setup_test_db().await;
    let (user, withdrawal, order_id) = processing_withdrawal(&pool, 10_000_000).await;
    let gateway = MockGateway::new().with_payout_delay(StdDuration::from_millis(300));
    let budget = StdDuration::from_secs(5);

    let (first, second) = tokio::join!(
        withdrawal_service::process_payout(&pool, &gateway, withdrawal, budget),
        withdrawal_service::process_payout(&pool, &gateway, withdrawal, budget),
    );
    let results = [first, second];

    let paid = results
        .iter()
        .filter(|r| matches!(r, Ok(PayoutOutcome::Paid)))
        .count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::Conflict(_))))
        .count();
    assert_eq!(paid, 1);
    assert_eq!(refused, 1);
    assert_eq!(gateway.payout_count(), 1);

    assert_eq!(withdrawal_status(&pool, withdrawal).await, WithdrawalStatus::Success);
    assert_eq!(entry_status(&pool, &order_id).await, "Success");
    assert_eq!(balance(&pool, user).await, 190_000_000);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn retry_is_refused_while_payout_in_flight() {
    let pool = common::setup_test_db().await;
    let config = common::test_config(true);
    let (_user, withdrawal, _order_id) = processing_withdrawal(&pool, 10_000_000).await;
    let mock = std::sync::Arc::new(MockGateway::new().with_payout_delay(StdDuration::from_millis(500)));
    let gateway: std::sync::Arc<dyn invest_ledger_server::gateway::PaymentGateway> = mock.clone();

    let queued = withdrawal_service::retry_payout(&pool, &gateway, &config, withdrawal)
        .await
        .unwrap();
    assert_eq!(queued.status, WithdrawalStatus::Processing);

    let err = withdrawal_service::retry_payout(&pool, &gateway, &config, withdrawal)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    for _ in 0..50 {
        if withdrawal_status(&pool, withdrawal).await == WithdrawalStatus::Success {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(100)).await;
    }
    assert_eq!(withdrawal_status(&pool, withdrawal).await, WithdrawalStatus::Success);
    assert_eq!(mock.payout_count(), 1);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn unknown_outcome_releases_claim_for_retry() {
    let pool = common::setup_test_db().await;
    let (_user, withdrawal, _order_id) = processing_withdrawal(&pool, 10_000_000).await;
    let gateway = MockGateway::with_payout_result(Err(GatewayError::Transport("reset".into())));
    let budget = StdDuration::from_secs(5);

    for _ in 0..2 {
        let outcome = withdrawal_service::process_payout(&pool, &gateway, withdrawal, budget)
            .await
            .unwrap();
        assert!(matches!(outcome, PayoutOutcome::Indeterminate(_)));
    }
    assert_eq!(gateway.payout_count(), 2);
    assert_eq!(withdrawal_status(&pool, withdrawal).await, WithdrawalStatus::Processing);
}

// ============================================================================
// Purchase Validation Tests
// ============================================================================

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn fractional_purchase_is_refused_before_charge() {
    let pool = common::setup_test_db().await;
    let gateway = MockGateway::new();
    let investor = insert_user(&pool, None, None, 0).await;
    let product = insert_product(&pool, 1).await;

    let err = investment_service::create(&pool, &gateway, investor, purchase(product, 30_000_050))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(gateway.charge_count(), 0);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn purchase_too_small_for_daily_return_is_refused() {
    let pool = common::setup_test_db().await;
    let gateway = MockGateway::new();
    let investor = insert_user(&pool, None, None, 0).await;
    // 1.00 over 300 days earns a third of a cent per day
    let product: Uuid = sqlx::query_scalar(
        "INSERT INTO products (name, tier, minimum_cents, maximum_cents, percentage_bps, duration)
         VALUES ('Micro', 1, 100, 50000000, 0, 300) RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    let err = investment_service::create(&pool, &gateway, investor, purchase(product, 100))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(gateway.charge_count(), 0);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM investments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn zero_profit_investment_still_completes() {
    let pool = common::setup_test_db().await;
    let investor = insert_user(&pool, None, Some(1), 0).await;
    let start = Utc::now();
    let investment = insert_running_investment(&pool, investor, 1, start).await;
    sqlx::query("UPDATE investments SET daily_profit_cents = 0 WHERE id = $1")
        .bind(investment)
        .execute(&pool)
        .await
        .unwrap();

    assert_eq!(scheduler::run_daily_returns(&pool, start).await.unwrap(), 1);

    let status: InvestmentStatus =
        sqlx::query_scalar("SELECT status FROM investments WHERE id = $1")
            .bind(investment)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, InvestmentStatus::Completed);
    assert_eq!(balance(&pool, investor).await, 0);
    assert_eq!(count_entries(&pool, investor, "return").await, 0);
}

// ============================================================================
// Admin Override Tests
// ============================================================================

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn admin_activation_schedules_first_return_without_touching_balances() {
    let pool = common::setup_test_db().await;
    let gateway = MockGateway::new();
    let investor = insert_user(&pool, None, None, 0).await;
    let product = insert_product(&pool, 1).await;
    let created = investment_service::create(&pool, &gateway, investor, purchase(product, 30_000_000))
        .await
        .unwrap();
    let id: Uuid = sqlx::query_scalar("SELECT id FROM investments WHERE order_id = $1")
        .bind(&created.order_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    let before = Utc::now();
    let running = investment_service::admin_set_status(&pool, id, "Running")
        .await
        .unwrap();
    assert_eq!(running.status, InvestmentStatus::Running);
    let next = running.next_return_at.unwrap();
    assert!(next >= before + Duration::hours(24) - Duration::seconds(1));
    assert!(next <= Utc::now() + Duration::hours(24) + Duration::seconds(1));

    let suspended = investment_service::admin_set_status(&pool, id, "Suspended")
        .await
        .unwrap();
    assert_eq!(suspended.status, InvestmentStatus::Suspended);
    assert_eq!(suspended.next_return_at, Some(next));

    let err = investment_service::admin_set_status(&pool, id, "Pending")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let err = investment_service::admin_set_status(&pool, Uuid::new_v4(), "Running")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let (balance_cents, total_invest): (i64, i64) =
        sqlx::query_as("SELECT balance_cents, total_invest_cents FROM users WHERE id = $1")
            .bind(investor)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(balance_cents, 0);
    assert_eq!(total_invest, 0);
    assert_eq!(entry_status(&pool, &created.order_id).await, "Pending");
}

// ============================================================================
// Concurrency and Reconciliation Tests
// ============================================================================

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn concurrent_withdrawals_never_overdraw() {
    let pool = common::setup_test_db().await;
    let config = common::test_config(false);
    let user = insert_user(&pool, None, None, 15_000_000).await;
    let account = insert_bank_account(&pool, user, true).await;
    let request = || CreateWithdrawalRequest {
        amount_cents: 10_000_000,
        bank_account_id: account,
    };

    let (first, second) = tokio::join!(
        withdrawal_service::create(&pool, &config, user, request()),
        withdrawal_service::create(&pool, &config, user, request()),
    );
    let results = [first, second];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(AppError::InsufficientFunds)))
            .count(),
        1
    );
    assert_eq!(balance(&pool, user).await, 5_000_000);
    assert_eq!(count_entries(&pool, user, "withdrawal").await, 1);
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn balance_reconciles_with_ledger_entries() {
    let pool = common::setup_test_db().await;
    let config = common::test_config(false);
    let investor = insert_user(&pool, None, Some(1), 0).await;
    let account = insert_bank_account(&pool, investor, true).await;
    let start = Utc::now();
    insert_running_investment(&pool, investor, 10, start).await;

    for day in 0..10 {
        scheduler::run_daily_returns(&pool, start + Duration::hours(24 * day))
            .await
            .unwrap();
    }

    let kept = withdrawal_service::create(
        &pool,
        &config,
        investor,
        CreateWithdrawalRequest {
            amount_cents: 6_000_000,
            bank_account_id: account,
        },
    )
    .await
    .unwrap();
    let refunded = withdrawal_service::create(
        &pool,
        &config,
        investor,
        CreateWithdrawalRequest {
            amount_cents: 5_000_000,
            bank_account_id: account,
        },
    )
    .await
    .unwrap();
    withdrawal_service::reject(&pool, refunded.id).await.unwrap();

    // Payouts to the user are Success debit entries; withdrawal holds are
    // taken at creation whatever the entry's later status.
    let paid_out: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM transactions
         WHERE user_id = $1 AND transaction_flow = 'debit' AND status = 'Success'",
    )
    .bind(investor)
    .fetch_one(&pool)
    .await
    .unwrap();
    let held: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM transactions
         WHERE user_id = $1 AND transaction_type = 'withdrawal'",
    )
    .bind(investor)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(paid_out, 10 * 1_300_000 + 5_000_000);
    assert_eq!(held, 11_000_000);
    assert_eq!(balance(&pool, investor).await, paid_out - held);
    assert_eq!(balance(&pool, investor).await, 10 * 1_300_000 - kept.amount_cents);
}

// ============================================================================
// Payment Settings Tests
// ============================================================================

fn settings_update(threshold_cents: i64, wishlist: Vec<Uuid>) -> UpdatePaymentSettingsRequest {
    UpdatePaymentSettingsRequest {
        bank_name: "Bank Negara Indonesia".to_string(),
        bank_code: "BNI".to_string(),
        account_number: "9990001112".to_string(),
        account_name: "Operations".to_string(),
        withdraw_threshold_cents: threshold_cents,
        wishlist_user_ids: wishlist,
    }
}

#[tokio::test]
#[serial]
#[ignore = "Requires database setup"]
async fn payment_settings_are_created_then_replaced() {
    let pool = common::setup_test_db().await;

    let err = settings_service::get(&pool).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let created = settings_service::update(&pool, settings_update(50_000_000, vec![]))
        .await
        .unwrap();
    assert_eq!(created.id, 1);
    assert_eq!(created.withdraw_threshold_cents, 50_000_000);

    let vip = insert_user(&pool, None, None, 0).await;
    settings_service::update(&pool, settings_update(20_000_000, vec![vip]))
        .await
        .unwrap();

    let stored = settings_service::get(&pool).await.unwrap();
    assert_eq!(stored.withdraw_threshold_cents, 20_000_000);
    assert!(stored.is_user_in_wishlist(vip));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_settings")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let err = settings_service::update(&pool, settings_update(0, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(
        settings_service::get(&pool).await.unwrap().withdraw_threshold_cents,
        20_000_000
    );
}
