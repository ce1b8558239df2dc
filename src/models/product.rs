//! Investment product templates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::RecordStatus;

/// Cumulative confirmed investment required before tier 2 and 3 products open up.
pub const HIGHER_TIER_PREREQUISITE_CENTS: i64 = 20_000_000;

/// Represents a product record from the database.
///
/// Rates and bounds are copied into each investment when it is created, so
/// editing a product never changes investments already purchased.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,

    /// 1-based tier; a confirmed investment raises the owner's level to this value
    pub tier: i32,

    #[serde(rename = "minimum", with = "crate::money::amount")]
    pub minimum_cents: i64,
    #[serde(rename = "maximum", with = "crate::money::amount")]
    pub maximum_cents: i64,

    /// Total return over the full duration, in basis points
    #[serde(rename = "percentage", serialize_with = "crate::money::percent::serialize")]
    pub percentage_bps: i32,

    /// Number of daily payouts
    pub duration: i32,

    pub status: RecordStatus,

    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn accepts_amount(&self, amount_cents: i64) -> bool {
        (self.minimum_cents..=self.maximum_cents).contains(&amount_cents)
    }

    /// Tiers 2 and 3 require the tier-1 prerequisite.
    pub fn requires_prerequisite(&self) -> bool {
        matches!(self.tier, 2 | 3)
    }
}
