//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! together with the pure state-transition rules each entity obeys.

use serde::{Deserialize, Serialize};

/// Bearer token model for authentication
pub mod access_token;
/// Banks, user bank accounts and account-number masking
pub mod bank;
/// Investment entity and its lifecycle rules
pub mod investment;
/// Gateway-facing payment record
pub mod payment;
/// Investment product templates
pub mod product;
/// Payout routing settings
pub mod settings;
/// Append-only ledger entries
pub mod transaction;
/// Platform users and their financial state
pub mod user;
/// Withdrawal requests and their lifecycle rules
pub mod withdrawal;

/// Active/Inactive flag shared by products and banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "record_status")]
pub enum RecordStatus {
    Active,
    Inactive,
}

/// Page/limit query parameters used by listing endpoints.
///
/// `page` starts at 1. `limit` defaults to 25 and values outside `1..=50`
/// fall back to the default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 25;
    pub const MAX_LIMIT: i64 = 50;

    pub fn limit(&self) -> i64 {
        match self.limit {
            Some(l) if (1..=Self::MAX_LIMIT).contains(&l) => l,
            _ => Self::DEFAULT_LIMIT,
        }
    }

    pub fn offset(&self) -> i64 {
        let page = self.page.filter(|p| *p >= 1).unwrap_or(1);
        (page - 1) * self.limit()
    }
}
