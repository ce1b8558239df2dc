//! Payment gateway adapter.
//!
//! Every concrete gateway is hidden behind [`PaymentGateway`]: token
//! exchange, charge creation for investment purchases and payout creation
//! for withdrawals. Responses are normalized into [`Charge`] and a plain
//! success/failure for payouts, and every failure surfaces as a
//! [`GatewayError`].
//!
//! Inbound callbacks are parsed per gateway into [`PaymentCallback`] /
//! [`PayoutCallback`]. The correlation key for both is our own order ID,
//! which we hand to the gateway as its reference when the charge or payout
//! is created.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::Config;
use crate::models::payment::PaymentMethod;
use crate::models::settings::PayoutDestination;

pub mod kytapay;
pub mod pakasir;

pub use kytapay::KytapayGateway;
pub use pakasir::PakasirGateway;

/// How long a charge stays payable when the gateway omits an expiry.
pub const DEFAULT_CHARGE_TTL_MINUTES: i64 = 15;

/// Failure talking to a payment gateway.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// Network error or timeout; the request may or may not have reached the gateway.
    #[error("transport error: {0}")]
    Transport(String),

    /// The gateway answered with a non-success status or response code.
    #[error("rejected by gateway: {0}")]
    Rejected(String),

    /// The gateway answered with a body we could not interpret.
    #[error("malformed gateway response: {0}")]
    Malformed(String),

    /// The selected gateway does not offer this operation.
    #[error("operation not supported by {0}")]
    Unsupported(&'static str),

    /// Credentials or URLs for the gateway are missing or invalid.
    #[error("gateway configuration error: {0}")]
    Config(String),

    /// The amount isn't a whole currency unit, which gateways can't transfer.
    #[error("amount of {0} cents is not a whole currency unit")]
    FractionalAmount(i64),
}

impl GatewayError {
    /// Whether the outcome of the call is unknown (the gateway may still act on it).
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GatewayError::Malformed(e.to_string())
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

/// Gateway implementations selectable through `PAYMENT_GATEWAY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    #[default]
    Kytapay,
    Pakasir,
}

impl GatewayKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayKind::Kytapay => "kytapay",
            GatewayKind::Pakasir => "pakasir",
        }
    }

    /// Whether the gateway can transfer money out to bank accounts.
    pub fn supports_payouts(self) -> bool {
        matches!(self, GatewayKind::Kytapay)
    }

    /// Resolve the `{gateway}` path segment of webhook routes.
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "kytapay" | "kyta" => Some(GatewayKind::Kytapay),
            "pakasir" => Some(GatewayKind::Pakasir),
            _ => None,
        }
    }

    pub fn parse_payment_callback(self, body: &[u8]) -> Result<PaymentCallback, GatewayError> {
        match self {
            GatewayKind::Kytapay => kytapay::parse_payment_callback(body),
            GatewayKind::Pakasir => pakasir::parse_payment_callback(body),
        }
    }

    pub fn parse_payout_callback(self, body: &[u8]) -> Result<PayoutCallback, GatewayError> {
        match self {
            GatewayKind::Kytapay => kytapay::parse_payout_callback(body),
            GatewayKind::Pakasir => Err(GatewayError::Unsupported("pakasir")),
        }
    }
}

/// Charge to create for an investment purchase.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Our order ID, used as the gateway reference
    pub reference_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
}

/// Normalized charge returned by any gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    /// VA number or QR string
    pub payment_code: Option<String>,
    pub payment_link: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Payout to submit for an approved withdrawal.
#[derive(Debug, Clone)]
pub struct PayoutRequest {
    /// Our withdrawal order ID, used as the gateway reference
    pub reference_id: String,
    pub amount_cents: i64,
    pub destination: PayoutDestination,
    pub description: String,
}

/// Normalized charge callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCallback {
    pub order_id: String,
    /// Gateway-side payment identifier, when supplied
    pub gateway_id: Option<String>,
    pub success: bool,
}

/// Normalized payout callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutCallback {
    pub order_id: String,
    pub success: bool,
}

/// Capability every payment gateway integration provides.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn kind(&self) -> GatewayKind;

    /// Obtain a credential for the following calls. Static-key gateways return their key.
    async fn access_token(&self) -> Result<String, GatewayError>;

    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError>;

    async fn create_payout(&self, request: &PayoutRequest) -> Result<(), GatewayError>;
}

/// Build the gateway selected in the configuration.
///
/// Pakasir has no payout API, so it can't be combined with `AUTO_WITHDRAW`.
pub fn from_config(config: &Config) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
    if config.auto_withdraw && !config.payment_gateway.supports_payouts() {
        return Err(GatewayError::Config(format!(
            "AUTO_WITHDRAW requires a gateway with payouts; {} has none",
            config.payment_gateway.as_str()
        )));
    }

    let timeout = Duration::from_secs(config.gateway_timeout_secs);
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GatewayError::Config(format!("HTTP client error: {}", e)))?;

    match config.payment_gateway {
        GatewayKind::Kytapay => Ok(Arc::new(KytapayGateway::from_config(client, config)?)),
        GatewayKind::Pakasir => Ok(Arc::new(PakasirGateway::from_config(client, config)?)),
    }
}

/// Normalize the success vocabulary gateways use for final statuses.
pub fn is_success_status(status: &str) -> bool {
    matches!(
        status.trim().to_uppercase().as_str(),
        "SUCCESS" | "PAID" | "COMPLETED"
    )
}

/// Response codes such as `2000000` or `200` count as success.
pub fn is_success_code(code: &str) -> bool {
    let code = code.trim();
    code.len() >= 3 && code.starts_with("200")
}

/// Parse a gateway expiry timestamp, falling back to `now + 15 minutes`.
pub fn parse_expiry(value: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .or_else(|| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.3f%:z").ok())
                .map(|t| t.with_timezone(&Utc))
        })
        .unwrap_or_else(|| now + chrono::Duration::minutes(DEFAULT_CHARGE_TTL_MINUTES))
}

/// Gateways take whole currency units. Fractional amounts are refused, never truncated.
pub fn whole_units(amount_cents: i64) -> Result<i64, GatewayError> {
    if amount_cents % 100 != 0 {
        return Err(GatewayError::FractionalAmount(amount_cents));
    }
    Ok(amount_cents / 100)
}

/// Normalize a base URL so relative joins keep its path.
pub(crate) fn base_url(raw: &str) -> Result<url::Url, GatewayError> {
    let mut normalized = raw.trim().trim_end_matches('/').to_string();
    normalized.push('/');
    url::Url::parse(&normalized)
        .map_err(|e| GatewayError::Config(format!("invalid base URL '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn success_vocabulary() {
        assert!(is_success_status("SUCCESS"));
        assert!(is_success_status(" paid "));
        assert!(is_success_status("Completed"));
        assert!(!is_success_status("FAILED"));
        assert!(!is_success_status("EXPIRED"));
        assert!(!is_success_status(""));
    }

    #[test]
    fn success_codes() {
        assert!(is_success_code("200"));
        assert!(is_success_code("2000000"));
        assert!(!is_success_code("20"));
        assert!(!is_success_code("4010001"));
        assert!(!is_success_code("201"));
    }

    #[test]
    fn expiry_parsing_and_fallback() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let parsed = parse_expiry(Some("2025-01-01T07:15:00+07:00"), now);
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 1, 0, 15, 0).unwrap());

        let millis = parse_expiry(Some("2025-01-01T00:30:00.000Z"), now);
        assert_eq!(millis, Utc.with_ymd_and_hms(2025, 1, 1, 0, 30, 0).unwrap());

        assert_eq!(parse_expiry(None, now), now + chrono::Duration::minutes(15));
        assert_eq!(parse_expiry(Some("soon"), now), now + chrono::Duration::minutes(15));
    }

    #[test]
    fn base_url_keeps_path_segment() {
        let base = base_url("https://api.kytapay.com/v2").unwrap();
        assert_eq!(
            base.join("access-token").unwrap().as_str(),
            "https://api.kytapay.com/v2/access-token"
        );
        let base = base_url("https://api.kytapay.com/v2/").unwrap();
        assert_eq!(
            base.join("payouts/transfers").unwrap().as_str(),
            "https://api.kytapay.com/v2/payouts/transfers"
        );
    }

    #[test]
    fn webhook_path_segments() {
        assert_eq!(GatewayKind::from_path("kyta"), Some(GatewayKind::Kytapay));
        assert_eq!(GatewayKind::from_path("pakasir"), Some(GatewayKind::Pakasir));
        assert_eq!(GatewayKind::from_path("stripe"), None);
    }

    #[test]
    fn only_transport_errors_are_indeterminate() {
        assert!(GatewayError::Transport("timeout".into()).is_indeterminate());
        assert!(!GatewayError::Rejected("400".into()).is_indeterminate());
        assert!(!GatewayError::Malformed("eof".into()).is_indeterminate());
    }

    #[test]
    fn whole_units_refuses_fractional_amounts() {
        assert_eq!(whole_units(9_000_000).unwrap(), 90_000);
        assert!(matches!(
            whole_units(9_000_050),
            Err(GatewayError::FractionalAmount(9_000_050))
        ));
        assert!(!GatewayError::FractionalAmount(1).is_indeterminate());
    }

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let mut all = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/ledger".to_string()),
            ("CRON_KEY".to_string(), "secret".to_string()),
        ];
        all.extend(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        envy::from_iter(all).unwrap()
    }

    #[test]
    fn auto_withdraw_is_refused_without_payout_support() {
        let config = config_with(&[
            ("PAYMENT_GATEWAY", "pakasir"),
            ("PAKASIR_API_KEY", "key"),
            ("PAKASIR_PROJECT", "depodomain"),
            ("AUTO_WITHDRAW", "true"),
        ]);
        assert!(matches!(from_config(&config), Err(GatewayError::Config(_))));
    }

    #[test]
    fn pakasir_without_auto_withdraw_builds() {
        let config = config_with(&[
            ("PAYMENT_GATEWAY", "pakasir"),
            ("PAKASIR_API_KEY", "key"),
            ("PAKASIR_PROJECT", "depodomain"),
        ]);
        let gateway = from_config(&config).unwrap();
        assert_eq!(gateway.kind(), GatewayKind::Pakasir);
    }
}
