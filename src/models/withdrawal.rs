//! Withdrawal data model, lifecycle rules and API types.
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──approve (manual)──► Success
//! Pending ──approve (auto)────► Processing ──payout ok──► Success
//!    │                              │
//!    │                              ├──payout rejected──► Failed (no refund)
//!    │                              └──failure callback─► Pending
//!    └──reject──► Failed (amount refunded)
//! ```
//!
//! The full amount is debited when the request is created; the charge is
//! taken out of what was already debited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RecordStatus;
use super::bank::BankAccountDetails;
use crate::error::AppError;
use crate::money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "withdrawal_status")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl WithdrawalStatus {
    /// Approve and reject both start from Pending only.
    pub fn ensure_pending(self, action: &str) -> Result<(), AppError> {
        if self == WithdrawalStatus::Pending {
            Ok(())
        } else {
            Err(AppError::Conflict(format!(
                "Only Pending withdrawals can be {}; this one is {:?}",
                action, self
            )))
        }
    }
}

/// Represents a withdrawal record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bank_account_id: Uuid,
    #[serde(rename = "amount", with = "money::amount")]
    pub amount_cents: i64,
    #[serde(rename = "charge", with = "money::amount")]
    pub charge_cents: i64,
    #[serde(rename = "final_amount", with = "money::amount")]
    pub final_amount_cents: i64,
    pub order_id: String,
    pub status: WithdrawalStatus,
    /// Attempt currently allowed to record the payout outcome
    #[serde(skip)]
    pub payout_attempt_id: Option<Uuid>,
    /// Set while an attempt is calling the gateway
    #[serde(skip)]
    pub payout_attempted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Charge and payout amount of a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalQuote {
    pub amount_cents: i64,
    pub charge_cents: i64,
    pub final_amount_cents: i64,
}

impl WithdrawalQuote {
    /// Validate `amount_cents` against `[min, max]` and price the charge.
    ///
    /// Payouts move whole currency units, so the amount must be whole and
    /// the charge is rounded half up to a whole unit.
    pub fn new(
        amount_cents: i64,
        min_cents: i64,
        max_cents: i64,
        charge_bps: i32,
    ) -> Result<Self, AppError> {
        if !money::is_whole_units(amount_cents) {
            return Err(AppError::Validation(
                "Withdrawal amount must be a whole number".to_string(),
            ));
        }
        if amount_cents < min_cents {
            return Err(AppError::Validation(format!(
                "Minimum withdrawal is {}",
                money::format_cents(min_cents)
            )));
        }
        if amount_cents > max_cents {
            return Err(AppError::Validation(format!(
                "Maximum withdrawal is {}",
                money::format_cents(max_cents)
            )));
        }

        let charge_cents = money::round_to_unit(money::percent_of(amount_cents, charge_bps));
        Ok(Self {
            amount_cents,
            charge_cents,
            final_amount_cents: amount_cents - charge_cents,
        })
    }
}

/// Request to withdraw balance to one of the caller's bank accounts.
///
/// # JSON Example
///
/// ```json
/// {
///   "amount": 100000,
///   "bank_account_id": "550e8400-e29b-41d4-a716-446655440000"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateWithdrawalRequest {
    #[serde(rename = "amount", with = "money::amount")]
    pub amount_cents: i64,
    pub bank_account_id: Uuid,
}

/// Withdrawal summary returned to the user who created it.
#[derive(Debug, Serialize)]
pub struct WithdrawalSummary {
    pub id: Uuid,
    pub order_id: String,
    #[serde(rename = "amount", with = "money::amount")]
    pub amount_cents: i64,
    #[serde(rename = "charge", with = "money::amount")]
    pub charge_cents: i64,
    #[serde(rename = "final_amount", with = "money::amount")]
    pub final_amount_cents: i64,
    pub bank_name: String,
    pub account_name: String,
    /// Masked as first 3 + `****` + last 3 digits
    pub account_number: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
}

/// Withdrawal joined with its destination account, used by listings.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WithdrawalListRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub phone: String,
    pub bank_account_id: Uuid,
    pub amount_cents: i64,
    pub charge_cents: i64,
    pub final_amount_cents: i64,
    pub order_id: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    pub account_name: String,
    pub account_number: String,
    pub bank_name: String,
    pub bank_code: String,
    pub bank_status: RecordStatus,
}

impl WithdrawalListRow {
    /// The user's own destination account.
    pub fn account(&self) -> BankAccountDetails {
        BankAccountDetails {
            id: self.bank_account_id,
            user_id: self.user_id,
            account_name: self.account_name.clone(),
            account_number: self.account_number.clone(),
            bank_name: self.bank_name.clone(),
            bank_code: self.bank_code.clone(),
            bank_status: self.bank_status,
        }
    }
}

/// User-facing listing entry.
#[derive(Debug, Serialize)]
pub struct WithdrawalListItem {
    #[serde(rename = "amount", with = "money::amount")]
    pub amount_cents: i64,
    #[serde(rename = "charge", with = "money::amount")]
    pub charge_cents: i64,
    #[serde(rename = "final_amount", with = "money::amount")]
    pub final_amount_cents: i64,
    pub order_id: String,
    pub status: WithdrawalStatus,
    pub withdrawal_time: DateTime<Utc>,
    pub account_name: String,
    pub account_number: String,
    pub bank_name: String,
}

impl From<WithdrawalListRow> for WithdrawalListItem {
    fn from(row: WithdrawalListRow) -> Self {
        Self {
            amount_cents: row.amount_cents,
            charge_cents: row.charge_cents,
            final_amount_cents: row.final_amount_cents,
            order_id: row.order_id,
            status: row.status,
            withdrawal_time: row.created_at,
            account_name: row.account_name,
            account_number: row.account_number,
            bank_name: row.bank_name,
        }
    }
}

/// Admin listing entry, with payout routing applied to the destination.
#[derive(Debug, Serialize)]
pub struct AdminWithdrawalItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub phone: String,
    pub bank_account_id: Uuid,
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    #[serde(rename = "amount", with = "money::amount")]
    pub amount_cents: i64,
    #[serde(rename = "charge", with = "money::amount")]
    pub charge_cents: i64,
    #[serde(rename = "final_amount", with = "money::amount")]
    pub final_amount_cents: i64,
    pub order_id: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
}

/// Admin listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct WithdrawalFilter {
    pub status: Option<WithdrawalStatus>,
    pub user_id: Option<Uuid>,
    /// Substring match on order ID
    pub search: Option<String>,
}
