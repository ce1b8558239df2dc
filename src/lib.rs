//! Investment ledger server.
//!
//! Users buy investment products through a payment gateway, receive daily
//! returns, earn multi-level referral bonuses and withdraw to their bank
//! accounts. Every balance change is written together with its ledger entry
//! inside one PostgreSQL transaction, under row locks.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod money;
pub mod services;
pub mod state;
