//! Investment data model, lifecycle rules and API types.
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──payment success──► Running ──TotalPaid >= Duration──► Completed
//!    │                            │
//!    └──payment failure──► Cancelled   └──admin──► Suspended / Cancelled / Completed
//! ```
//!
//! Payment callbacks only act on `Pending` investments, which makes webhook
//! replay a no-op. Admin overrides may move an investment into any of
//! Suspended, Cancelled, Completed or Running and never touch balances.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Interval between two daily payouts.
pub fn return_interval() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "investment_status")]
pub enum InvestmentStatus {
    Pending,
    Running,
    Completed,
    Suspended,
    Cancelled,
}

impl InvestmentStatus {
    /// Payment callbacks may only settle an investment that is still Pending.
    pub fn awaits_payment(self) -> bool {
        self == InvestmentStatus::Pending
    }

    /// Statuses shown on the active-investments overview.
    pub fn is_visible_as_active(self) -> bool {
        matches!(
            self,
            InvestmentStatus::Running | InvestmentStatus::Completed | InvestmentStatus::Suspended
        )
    }

    /// Parse a status an admin may assign by hand.
    pub fn parse_admin_target(value: &str) -> Result<Self, AppError> {
        match value {
            "Suspended" => Ok(InvestmentStatus::Suspended),
            "Cancelled" => Ok(InvestmentStatus::Cancelled),
            "Completed" => Ok(InvestmentStatus::Completed),
            "Running" => Ok(InvestmentStatus::Running),
            _ => Err(AppError::Validation(format!(
                "Invalid status '{}': expected Suspended, Cancelled, Completed or Running",
                value
            ))),
        }
    }
}

/// Represents an investment record from the database.
///
/// Rate, duration and tier are copied from the product at purchase time.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Investment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub product_tier: i32,
    #[serde(rename = "amount", with = "crate::money::amount")]
    pub amount_cents: i64,
    #[serde(rename = "percentage", serialize_with = "crate::money::percent::serialize")]
    pub percentage_bps: i32,
    pub duration: i32,
    #[serde(rename = "daily_profit", with = "crate::money::amount")]
    pub daily_profit_cents: i64,

    /// Number of daily payouts made so far
    pub total_paid: i32,

    #[serde(rename = "total_returned", with = "crate::money::amount")]
    pub total_returned_cents: i64,
    pub last_return_at: Option<DateTime<Utc>>,
    pub next_return_at: Option<DateTime<Utc>>,
    pub order_id: String,
    pub status: InvestmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// State written back after one daily payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnAdvance {
    pub total_paid: i32,
    pub total_returned_cents: i64,
    pub last_return_at: DateTime<Utc>,
    pub next_return_at: DateTime<Utc>,
    pub status: InvestmentStatus,
}

/// State written back by an admin status override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOverride {
    pub status: InvestmentStatus,
    pub next_return_at: Option<DateTime<Utc>>,
}

impl Investment {
    /// Whether the daily return job should pay this investment at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == InvestmentStatus::Running
            && self.total_paid < self.duration
            && self.next_return_at.is_some_and(|at| at <= now)
    }

    /// Counters after paying one more daily return at `now`.
    pub fn advance(&self, now: DateTime<Utc>) -> ReturnAdvance {
        let total_paid = self.total_paid + 1;
        let status = if total_paid >= self.duration {
            InvestmentStatus::Completed
        } else {
            self.status
        };

        ReturnAdvance {
            total_paid,
            total_returned_cents: self.total_returned_cents + self.daily_profit_cents,
            last_return_at: now,
            next_return_at: now + return_interval(),
            status,
        }
    }

    /// Result of an admin moving this investment to `target`.
    ///
    /// Reactivating a Pending or Cancelled investment schedules its first
    /// payout 24 hours from `now`; every other override keeps the schedule.
    pub fn admin_override(&self, target: InvestmentStatus, now: DateTime<Utc>) -> StatusOverride {
        let reactivated = target == InvestmentStatus::Running
            && matches!(
                self.status,
                InvestmentStatus::Pending | InvestmentStatus::Cancelled
            );

        StatusOverride {
            status: target,
            next_return_at: if reactivated {
                Some(now + return_interval())
            } else {
                self.next_return_at
            },
        }
    }
}

/// Request to purchase an investment.
///
/// # JSON Example
///
/// ```json
/// {
///   "product_id": "550e8400-e29b-41d4-a716-446655440000",
///   "amount": 300000,
///   "payment_method": "BANK",
///   "payment_channel": "BCA"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateInvestmentRequest {
    pub product_id: Uuid,
    #[serde(rename = "amount", with = "crate::money::amount")]
    pub amount_cents: i64,
    pub payment_method: String,
    #[serde(default)]
    pub payment_channel: String,
}

/// Response returned after a purchase is registered.
#[derive(Debug, Serialize)]
pub struct CreateInvestmentResponse {
    pub order_id: String,
    #[serde(rename = "amount", with = "crate::money::amount")]
    pub amount_cents: i64,
    pub product: String,
    #[serde(rename = "percentage", serialize_with = "crate::money::percent::serialize")]
    pub percentage_bps: i32,
    pub duration: i32,
    #[serde(rename = "daily_profit", with = "crate::money::amount")]
    pub daily_profit_cents: i64,
    pub status: InvestmentStatus,
    pub payment_code: Option<String>,
    pub payment_link: Option<String>,
    pub expired_at: Option<DateTime<Utc>>,
}

/// Body of `PUT /admin/investments/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateInvestmentStatusRequest {
    pub status: String,
}

/// Admin listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct InvestmentFilter {
    pub status: Option<InvestmentStatus>,
    pub product_id: Option<Uuid>,
    /// Substring match on order ID
    pub search: Option<String>,
}

/// Admin view of an investment joined with owner and product names.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AdminInvestmentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub phone: String,
    pub product_id: Uuid,
    pub product_name: String,
    #[serde(rename = "amount", with = "crate::money::amount")]
    pub amount_cents: i64,
    pub duration: i32,
    #[serde(rename = "daily_profit", with = "crate::money::amount")]
    pub daily_profit_cents: i64,
    pub total_paid: i32,
    #[serde(rename = "total_returned", with = "crate::money::amount")]
    pub total_returned_cents: i64,
    pub last_return_at: Option<DateTime<Utc>>,
    pub next_return_at: Option<DateTime<Utc>>,
    pub order_id: String,
    pub status: InvestmentStatus,
    pub created_at: DateTime<Utc>,
}
