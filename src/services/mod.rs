//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They own the database transactions, take the row locks and apply the
//! state-machine rules defined on the models.

pub mod investment_service;
pub mod ledger;
pub mod referral;
pub mod scheduler;
pub mod settings_service;
pub mod withdrawal_service;
