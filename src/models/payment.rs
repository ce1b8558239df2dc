//! Gateway-facing payment record tied 1:1 to an investment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Bank channels accepted for virtual-account payments.
pub const BANK_CHANNELS: [&str; 6] = ["BCA", "BRI", "BNI", "MANDIRI", "PERMATA", "BNC"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

/// How the investor pays the charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    Qris,
    /// Virtual account at the given bank channel
    BankTransfer(String),
}

impl PaymentMethod {
    /// Validate the `payment_method` / `payment_channel` pair of a purchase.
    pub fn parse(method: &str, channel: &str) -> Result<Self, AppError> {
        let method = method.trim().to_uppercase();
        let channel = channel.trim().to_uppercase();

        match method.as_str() {
            "QRIS" => Ok(PaymentMethod::Qris),
            "BANK" => {
                if BANK_CHANNELS.contains(&channel.as_str()) {
                    Ok(PaymentMethod::BankTransfer(channel))
                } else {
                    Err(AppError::Validation(format!(
                        "Unsupported bank channel '{}'",
                        channel
                    )))
                }
            }
            _ => Err(AppError::Validation(
                "Payment method must be QRIS or BANK".to_string(),
            )),
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            PaymentMethod::Qris => "QRIS",
            PaymentMethod::BankTransfer(_) => "BANK",
        }
    }

    pub fn channel(&self) -> Option<&str> {
        match self {
            PaymentMethod::Qris => None,
            PaymentMethod::BankTransfer(channel) => Some(channel),
        }
    }
}

/// Represents a payment record from the database.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub investment_id: Uuid,

    /// Gateway-side identifier, filled in by the first callback that carries one
    pub reference_id: Option<String>,

    /// Same value as the investment's order ID; webhook correlation key
    pub order_id: String,

    pub payment_method: String,
    pub payment_channel: Option<String>,

    /// VA number or QR string
    pub payment_code: Option<String>,

    pub payment_link: Option<String>,
    pub status: PaymentStatus,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `GET /payments/{order_id}` payload.
#[derive(Debug, sqlx::FromRow, Serialize)]
pub struct PaymentDetailResponse {
    pub product: String,
    pub order_id: String,
    #[serde(rename = "amount", with = "crate::money::amount")]
    pub amount_cents: i64,
    pub payment_code: Option<String>,
    pub payment_channel: Option<String>,
    pub payment_method: String,
    pub payment_link: Option<String>,
    pub expired_at: Option<DateTime<Utc>>,
    pub status: PaymentStatus,
}
