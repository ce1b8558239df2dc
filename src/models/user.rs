//! User data model and API response type.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Value of `investment_status` once any investment has been confirmed.
pub const INVESTMENT_STATUS_ACTIVE: &str = "Active";

/// Represents a user record from the database.
///
/// # Balance Storage
///
/// Balances are `i64` cents. `balance_cents >= 0` is enforced by a CHECK
/// constraint and by the ledger's validated debit.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct User {
    pub id: Uuid,

    pub name: String,

    /// Phone number used as login identity
    pub number: String,

    /// Referrer who invited this user. Root users have none.
    pub reff_by: Option<Uuid>,

    #[serde(rename = "balance", with = "crate::money::amount")]
    pub balance_cents: i64,

    /// Cumulative confirmed investment principal, never decreases
    #[serde(rename = "total_invest", with = "crate::money::amount")]
    pub total_invest_cents: i64,

    /// Highest product tier ever funded. NULL until the first confirmation.
    pub level: Option<i32>,

    pub spin_ticket: Option<i32>,

    pub investment_status: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Level used for comparisons, treating "no level yet" as zero.
    pub fn effective_level(&self) -> i32 {
        self.level.unwrap_or(0)
    }
}

/// `GET /me` payload.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub name: String,
    pub number: String,
    #[serde(rename = "balance", with = "crate::money::amount")]
    pub balance_cents: i64,
    #[serde(rename = "total_invest", with = "crate::money::amount")]
    pub total_invest_cents: i64,
    pub level: i32,
    pub spin_ticket: i32,
    pub investment_status: String,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            level: user.effective_level(),
            spin_ticket: user.spin_ticket.unwrap_or(0),
            id: user.id,
            name: user.name,
            number: user.number,
            balance_cents: user.balance_cents,
            total_invest_cents: user.total_invest_cents,
            investment_status: user.investment_status,
        }
    }
}
