//! Multi-level referral bonuses.
//!
//! Two events pay the up-to-three referrers above a user:
//!
//! - a confirmed investment purchase (10% / 5% / 1% of the principal), and
//! - each daily return (5% / 2% / 1% of the daily profit).
//!
//! The walk follows `reff_by` from the nearest referrer outward and stops
//! at the first ancestor that is missing or has no referrer of its own. On
//! daily returns an ancestor whose level is below the investor's receives
//! nothing, but still occupies its level in the chain.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::transaction::{
        NewTransaction, TransactionFlow, TransactionStatus, TransactionType, generate_order_id,
    },
    money,
    services::ledger,
};

/// Levels of referrers that can receive a bonus.
pub const MAX_DEPTH: usize = 3;

/// Purchases at or above this principal earn the direct referrer a spin ticket.
pub const SPIN_TICKET_THRESHOLD_CENTS: i64 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BonusVariant {
    /// One-off bonus when an investment is confirmed
    Confirmation,
    /// Team-management bonus on every daily return
    DailyTeam,
}

impl BonusVariant {
    /// Basis points paid to levels 1, 2 and 3.
    pub fn rates(self) -> [i32; MAX_DEPTH] {
        match self {
            BonusVariant::Confirmation => [1000, 500, 100],
            BonusVariant::DailyTeam => [500, 200, 100],
        }
    }

    fn kind(self) -> TransactionType {
        match self {
            BonusVariant::Confirmation => TransactionType::ReferralBonus,
            BonusVariant::DailyTeam => TransactionType::Team,
        }
    }

    fn order_prefix(self) -> &'static str {
        match self {
            BonusVariant::Confirmation => "REF",
            BonusVariant::DailyTeam => "TEAM",
        }
    }

    fn message(self, depth: usize) -> String {
        match self {
            BonusVariant::Confirmation => format!("Referral bonus level {}", depth),
            BonusVariant::DailyTeam => format!("Team management bonus level {}", depth),
        }
    }
}

/// Referrer visited by the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ancestor {
    pub user_id: Uuid,
    /// Effective level (no level counts as 0)
    pub level: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedBonus {
    pub user_id: Uuid,
    /// 1 for the direct referrer
    pub depth: usize,
    pub amount_cents: i64,
}

/// Bonuses owed to `chain` (nearest referrer first) for an event on
/// `base_cents` by a user at `origin_level`.
///
/// Zero-value bonuses are left out.
pub fn plan_bonuses(
    variant: BonusVariant,
    base_cents: i64,
    origin_level: i32,
    chain: &[Ancestor],
) -> Vec<PlannedBonus> {
    let rates = variant.rates();

    chain
        .iter()
        .take(MAX_DEPTH)
        .enumerate()
        .filter(|(_, a)| variant != BonusVariant::DailyTeam || a.level >= origin_level)
        .map(|(i, a)| PlannedBonus {
            user_id: a.user_id,
            depth: i + 1,
            amount_cents: money::percent_of(base_cents, rates[i]),
        })
        .filter(|b| b.amount_cents > 0)
        .collect()
}

#[derive(sqlx::FromRow)]
struct AncestorRow {
    id: Uuid,
    level: Option<i32>,
    reff_by: Option<Uuid>,
}

/// Lock and collect the referral chain above a user, nearest first.
async fn lock_chain(
    conn: &mut PgConnection,
    first: Option<Uuid>,
) -> Result<Vec<Ancestor>, AppError> {
    let mut chain = Vec::with_capacity(MAX_DEPTH);
    let mut next = first;

    while chain.len() < MAX_DEPTH {
        let Some(id) = next else { break };

        let row = sqlx::query_as::<_, AncestorRow>(
            "SELECT id, level, reff_by FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else { break };
        chain.push(Ancestor {
            user_id: row.id,
            level: row.level.unwrap_or(0),
        });
        next = row.reff_by;
    }

    Ok(chain)
}

/// Pay referral bonuses for an event by the user with `referrer` / `origin_level`.
///
/// Runs inside the caller's transaction. Each bonus is credited and then
/// recorded as a Success `debit` entry with its own order ID.
pub async fn distribute(
    conn: &mut PgConnection,
    variant: BonusVariant,
    referrer: Option<Uuid>,
    origin_level: i32,
    base_cents: i64,
) -> Result<Vec<PlannedBonus>, AppError> {
    let chain = lock_chain(conn, referrer).await?;
    if chain.is_empty() {
        return Ok(Vec::new());
    }

    let bonuses = plan_bonuses(variant, base_cents, origin_level, &chain);
    for bonus in &bonuses {
        ledger::credit(conn, bonus.user_id, bonus.amount_cents).await?;
        ledger::record(
            conn,
            &NewTransaction {
                user_id: bonus.user_id,
                amount_cents: bonus.amount_cents,
                charge_cents: 0,
                order_id: generate_order_id(variant.order_prefix()),
                flow: TransactionFlow::Debit,
                kind: variant.kind(),
                message: Some(variant.message(bonus.depth)),
                status: TransactionStatus::Success,
            },
        )
        .await?;
    }

    if variant == BonusVariant::Confirmation && base_cents >= SPIN_TICKET_THRESHOLD_CENTS {
        let direct = chain[0].user_id;
        sqlx::query(
            "UPDATE users SET spin_ticket = COALESCE(spin_ticket, 0) + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(direct)
        .execute(&mut *conn)
        .await?;
        tracing::debug!(user_id = %direct, "spin ticket awarded");
    }

    Ok(bonuses)
}
