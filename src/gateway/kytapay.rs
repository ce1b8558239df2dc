//! Kytapay integration: OAuth-style token exchange, QRIS/VA charges and
//! bank transfers.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{
    Charge, ChargeRequest, GatewayError, GatewayKind, PaymentCallback, PaymentGateway,
    PayoutCallback, PayoutRequest, base_url, is_success_code, is_success_status, parse_expiry,
    whole_units,
};
use crate::config::Config;
use crate::models::payment::PaymentMethod;

/// Seconds a charge stays payable on the gateway side.
const CHARGE_EXPIRES_SECS: u32 = 900;

pub struct KytapayGateway {
    client: reqwest::Client,
    base: Url,
    client_id: String,
    client_secret: String,
    notify_url: String,
    success_url: String,
    failed_url: String,
    payout_notify_url: String,
}

/// Response envelope shared by every Kytapay endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    response_code: String,
    #[serde(default)]
    response_message: String,
    response_data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    #[serde(default)]
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct PaymentData {
    qr_string: Option<String>,
    account_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChargeData {
    #[serde(default)]
    payment_data: PaymentData,
    checkout_url: Option<String>,
    expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackBody {
    #[serde(default)]
    callback_code: String,
    callback_data: CallbackData,
}

#[derive(Debug, Deserialize)]
struct CallbackData {
    id: Option<String>,
    #[serde(default)]
    reference_id: String,
    #[serde(default)]
    status: String,
}

impl KytapayGateway {
    pub fn from_config(client: reqwest::Client, config: &Config) -> Result<Self, GatewayError> {
        let client_id = config
            .kytapay_client_id
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::Config("KYTAPAY_CLIENT_ID is not set".to_string()))?;
        let client_secret = config
            .kytapay_client_secret
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::Config("KYTAPAY_CLIENT_SECRET is not set".to_string()))?;

        Ok(Self {
            client,
            base: base_url(&config.kytapay_base_url)?,
            client_id,
            client_secret,
            notify_url: config.notify_url.clone(),
            success_url: config.success_url.clone(),
            failed_url: config.failed_url.clone(),
            payout_notify_url: config.callback_withdraw.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base
            .join(path)
            .map_err(|e| GatewayError::Config(format!("invalid endpoint '{}': {}", path, e)))
    }

    /// POST a JSON body with a fresh bearer token.
    async fn post_authorized(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<(reqwest::StatusCode, Vec<u8>), GatewayError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.endpoint(path)?)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }
}

#[async_trait]
impl PaymentGateway for KytapayGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Kytapay
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(self.endpoint("access-token")?)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({ "grant_type": "client_credentials" }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Rejected(format!(
                "access token request returned {}",
                status
            )));
        }

        let envelope: Envelope<TokenData> = response.json().await?;
        envelope
            .response_data
            .map(|d| d.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatewayError::Malformed("access token is empty".to_string()))
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError> {
        let mut body = json!({
            "reference_id": request.reference_id,
            "amount": whole_units(request.amount_cents)?,
            "notify_url": self.notify_url,
            "success_url": self.success_url,
            "failed_url": self.failed_url,
            "expires_time": CHARGE_EXPIRES_SECS,
        });

        let path = match &request.method {
            PaymentMethod::Qris => "payments/create/qris",
            PaymentMethod::BankTransfer(channel) => {
                body["bank_code"] = json!(channel);
                "payments/create/va"
            }
        };

        tracing::debug!(order_id = %request.reference_id, path, "creating kytapay charge");
        let (status, raw) = self.post_authorized(path, body).await?;
        if !status.is_success() {
            return Err(GatewayError::Rejected(format!(
                "charge request returned {}: {}",
                status,
                String::from_utf8_lossy(&raw)
            )));
        }

        parse_charge_response(&raw, &request.method)
    }

    async fn create_payout(&self, request: &PayoutRequest) -> Result<(), GatewayError> {
        let body = json!({
            "reference_id": request.reference_id,
            "amount": whole_units(request.amount_cents)?,
            "description": request.description,
            "destination": {
                "code": request.destination.bank_code,
                "account_number": request.destination.account_number,
                "account_name": request.destination.account_name,
            },
            "notify_url": self.payout_notify_url,
        });

        tracing::info!(order_id = %request.reference_id, "submitting kytapay payout");
        let (_status, raw) = self.post_authorized("payouts/transfers", body).await?;
        parse_payout_response(&raw)
    }
}

/// Normalize a charge response. QRIS charges carry a QR string, VA charges
/// an account number.
pub fn parse_charge_response(body: &[u8], method: &PaymentMethod) -> Result<Charge, GatewayError> {
    let envelope: Envelope<ChargeData> =
        serde_json::from_slice(body).map_err(|e| GatewayError::Malformed(e.to_string()))?;

    if !is_success_code(&envelope.response_code) {
        return Err(GatewayError::Rejected(format!(
            "{} {}",
            envelope.response_code, envelope.response_message
        )));
    }

    let data = envelope.response_data.ok_or_else(|| {
        GatewayError::Malformed(format!(
            "charge response without data ({} {})",
            envelope.response_code, envelope.response_message
        ))
    })?;

    let code = match method {
        PaymentMethod::Qris => data.payment_data.qr_string,
        PaymentMethod::BankTransfer(_) => data.payment_data.account_number,
    };

    Ok(Charge {
        payment_code: code.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        payment_link: data.checkout_url.filter(|u| !u.is_empty()),
        expires_at: parse_expiry(data.expires_at.as_deref(), Utc::now()),
    })
}

/// A payout is accepted only when `response_code` starts with `200`.
pub fn parse_payout_response(body: &[u8]) -> Result<(), GatewayError> {
    let envelope: Envelope<serde_json::Value> =
        serde_json::from_slice(body).map_err(|e| GatewayError::Malformed(e.to_string()))?;

    if is_success_code(&envelope.response_code) {
        Ok(())
    } else {
        Err(GatewayError::Rejected(format!(
            "{} {}",
            envelope.response_code, envelope.response_message
        )))
    }
}

fn parse_callback(body: &[u8]) -> Result<(CallbackBody, String), GatewayError> {
    let parsed: CallbackBody =
        serde_json::from_slice(body).map_err(|e| GatewayError::Malformed(e.to_string()))?;
    let order_id = parsed.callback_data.reference_id.trim().to_string();
    if order_id.is_empty() {
        return Err(GatewayError::Malformed("reference_id is empty".to_string()));
    }
    Ok((parsed, order_id))
}

fn callback_succeeded(body: &CallbackBody) -> bool {
    let status = body.callback_data.status.trim();
    if status.is_empty() {
        is_success_code(&body.callback_code)
    } else {
        is_success_status(status)
    }
}

pub fn parse_payment_callback(body: &[u8]) -> Result<PaymentCallback, GatewayError> {
    let (parsed, order_id) = parse_callback(body)?;
    Ok(PaymentCallback {
        success: callback_succeeded(&parsed),
        gateway_id: parsed
            .callback_data
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()),
        order_id,
    })
}

pub fn parse_payout_callback(body: &[u8]) -> Result<PayoutCallback, GatewayError> {
    let (parsed, order_id) = parse_callback(body)?;
    Ok(PayoutCallback {
        success: callback_succeeded(&parsed),
        order_id,
    })
}
