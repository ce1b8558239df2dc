//! Fixed-point money arithmetic.
//!
//! Amounts are `i64` minor units (cents) and rates are basis points
//! (1 bp = 0.01%). Every derived amount goes through [`round_div`], the
//! integer form of `floor(x * 100 + 0.5) / 100` applied to a value already
//! expressed in cents, so reconciliation against the audit trail is exact.
//!
//! JSON bodies carry decimal currency amounts (`300000.00`) and percentages
//! (`30.5`). The [`amount`] and [`percent`] serde modules convert at that
//! boundary; nothing past it sees a decimal.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Basis points in 100%.
pub const BPS_SCALE: i64 = 10_000;

/// Cents in one currency unit.
pub const CENTS_PER_UNIT: i64 = 100;

/// Whether `cents` is a whole number of currency units.
pub fn is_whole_units(cents: i64) -> bool {
    cents % CENTS_PER_UNIT == 0
}

/// Round non-negative `cents` half up to a whole currency unit.
pub fn round_to_unit(cents: i64) -> i64 {
    round_div(i128::from(cents), i128::from(CENTS_PER_UNIT)) * CENTS_PER_UNIT
}

/// Cents as a two-place decimal.
pub fn to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// A decimal amount in cents. `None` when it has sub-cent digits or
/// doesn't fit in an `i64`.
pub fn from_decimal(value: Decimal) -> Option<i64> {
    let scaled = value.checked_mul(Decimal::ONE_HUNDRED)?;
    if !scaled.fract().is_zero() {
        return None;
    }
    scaled.to_i64()
}

/// `#[serde(with = "money::amount")]` for `i64` cents fields.
pub mod amount {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(cents: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&super::to_decimal(*cents), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        super::from_decimal(value).ok_or_else(|| {
            D::Error::custom(format!("invalid amount {}: at most two decimal places", value))
        })
    }
}

/// `#[serde(serialize_with = "money::percent::serialize")]` for basis point fields.
pub mod percent {
    use rust_decimal::Decimal;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bps: &i32, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&Decimal::new(i64::from(*bps), 2), serializer)
    }
}

/// Divide `numerator / denominator`, rounding half up.
///
/// Both operands must be non-negative and `denominator` positive. Computed
/// in `i128` so `amount * rate` products cannot overflow.
pub fn round_div(numerator: i128, denominator: i128) -> i64 {
    debug_assert!(numerator >= 0 && denominator > 0);
    ((2 * numerator + denominator) / (2 * denominator)) as i64
}

/// `rate_bps` percent of `base_cents`, rounded half up to the cent.
pub fn percent_of(base_cents: i64, rate_bps: i32) -> i64 {
    round_div(
        i128::from(base_cents) * i128::from(rate_bps),
        i128::from(BPS_SCALE),
    )
}

/// Daily payout for an investment: `(amount * percentage / 100 + amount) / duration`.
pub fn daily_profit(amount_cents: i64, percentage_bps: i32, duration_days: i32) -> i64 {
    round_div(
        i128::from(amount_cents) * (i128::from(BPS_SCALE) + i128::from(percentage_bps)),
        i128::from(BPS_SCALE) * i128::from(duration_days),
    )
}

/// Format cents as a plain decimal string (`1250075` -> `"12500.75"`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
