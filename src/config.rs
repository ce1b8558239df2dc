//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into a type-safe struct.

use serde::Deserialize;

use crate::gateway::GatewayKind;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `CRON_KEY` (required): shared secret expected in the `X-CRON-KEY` header
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `PAYMENT_GATEWAY` (optional): `kytapay` or `pakasir`, defaults to `kytapay`
///
/// Gateway credentials, callback URLs and withdrawal limits are documented on their fields.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_port")]
    pub server_port: u16,

    pub cron_key: String,

    #[serde(default)]
    pub payment_gateway: GatewayKind,

    #[serde(default = "default_kytapay_base_url")]
    pub kytapay_base_url: String,
    pub kytapay_client_id: Option<String>,
    pub kytapay_client_secret: Option<String>,

    #[serde(default = "default_pakasir_base_url")]
    pub pakasir_base_url: String,
    pub pakasir_api_key: Option<String>,
    pub pakasir_project: Option<String>,

    /// Charge callback URLs handed to the gateway
    #[serde(default)]
    pub notify_url: String,
    #[serde(default)]
    pub success_url: String,
    #[serde(default)]
    pub failed_url: String,

    /// Payout notify URL
    #[serde(default)]
    pub callback_withdraw: String,

    /// Per-request timeout for charge creation and token exchange
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,

    /// Overall budget for one background payout task
    #[serde(default = "default_payout_timeout")]
    pub payout_timeout_secs: u64,

    #[serde(default = "default_withdraw_min")]
    pub withdraw_min_cents: i64,

    #[serde(default = "default_withdraw_max")]
    pub withdraw_max_cents: i64,

    /// Withdrawal charge in basis points (1000 = 10%)
    #[serde(default = "default_withdraw_charge")]
    pub withdraw_charge_bps: i32,

    /// When true, approvals submit a payout through the gateway instead of
    /// marking the withdrawal paid by hand. Only valid with a gateway that
    /// supports payouts.
    #[serde(default)]
    pub auto_withdraw: bool,
}

fn default_max_connections() -> u32 {
    10
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_kytapay_base_url() -> String {
    "https://api.kytapay.com/v2".to_string()
}

fn default_pakasir_base_url() -> String {
    "https://app.pakasir.com/api".to_string()
}

fn default_gateway_timeout() -> u64 {
    15
}

fn default_payout_timeout() -> u64 {
    120
}

fn default_withdraw_min() -> i64 {
    5_000_000
}

fn default_withdraw_max() -> i64 {
    1_000_000_000
}

fn default_withdraw_charge() -> i32 {
    1000
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL, CRON_KEY)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are converted automatically: cron_key -> CRON_KEY
        envy::from_env::<Config>()
    }
}
