//! Ledger entry model and API response type.
//!
//! Every change to a user's balance is paired with a row in `transactions`
//! written inside the same database transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of money relative to the platform.
///
/// `credit` is money flowing into the platform (a purchase, a withdrawal
/// hold); `debit` is money the platform pays out to the user (returns,
/// bonuses, refunds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_flow", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionFlow {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

/// Kind of balance-affecting event a ledger entry documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Investment,
    Return,
    /// Daily team-management bonus from a downline's return
    Team,
    /// One-off bonus from a downline's confirmed purchase
    ReferralBonus,
    Withdrawal,
    Refund,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Investment => "investment",
            TransactionType::Return => "return",
            TransactionType::Team => "team",
            TransactionType::ReferralBonus => "referral_bonus",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Refund => "refund",
        }
    }
}

/// Represents a ledger entry from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "amount", with = "crate::money::amount")]
    pub amount_cents: i64,
    #[serde(rename = "charge", with = "crate::money::amount")]
    pub charge_cents: i64,

    /// Globally unique; shared with the investment or withdrawal it documents
    pub order_id: String,

    pub transaction_flow: TransactionFlow,
    pub transaction_type: String,
    pub message: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry to insert.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub charge_cents: i64,
    pub order_id: String,
    pub flow: TransactionFlow,
    pub kind: TransactionType,
    pub message: Option<String>,
    pub status: TransactionStatus,
}

/// Query parameters for `GET /transactions`.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
}

/// Generate a globally unique order ID such as `RET20250101093000123456789`.
///
/// A millisecond timestamp plus six random digits; the UNIQUE constraint on
/// every order ID column rejects the unlikely collision.
pub fn generate_order_id(prefix: &str) -> String {
    format!(
        "{}{}{:06}",
        prefix,
        Utc::now().format("%Y%m%d%H%M%S%3f"),
        rand::random_range(0..1_000_000u32)
    )
}
