//! Pakasir integration: static API key, QRIS and VA charges. Pakasir
//! does not offer payouts.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{
    Charge, ChargeRequest, GatewayError, GatewayKind, PaymentCallback, PaymentGateway,
    PayoutRequest, base_url, is_success_status, parse_expiry, whole_units,
};
use crate::config::Config;
use crate::models::payment::PaymentMethod;

pub struct PakasirGateway {
    client: reqwest::Client,
    base: Url,
    api_key: String,
    project: String,
}

#[derive(Debug, Deserialize)]
struct ChargeEnvelope {
    payment: Option<ChargeData>,
}

#[derive(Debug, Deserialize)]
struct ChargeData {
    payment_number: Option<String>,
    expired_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    order_id: String,
    #[serde(default)]
    status: String,
}

/// Path segment of the charge endpoint for a payment method.
fn method_segment(method: &PaymentMethod) -> String {
    match method {
        PaymentMethod::Qris => "qris".to_string(),
        PaymentMethod::BankTransfer(channel) => format!("{}_va", channel.to_lowercase()),
    }
}

impl PakasirGateway {
    pub fn from_config(client: reqwest::Client, config: &Config) -> Result<Self, GatewayError> {
        let api_key = config
            .pakasir_api_key
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::Config("PAKASIR_API_KEY is not set".to_string()))?;
        let project = config
            .pakasir_project
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::Config("PAKASIR_PROJECT is not set".to_string()))?;

        Ok(Self {
            client,
            base: base_url(&config.pakasir_base_url)?,
            api_key,
            project,
        })
    }
}

#[async_trait]
impl PaymentGateway for PakasirGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Pakasir
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        Ok(self.api_key.clone())
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError> {
        let path = format!("transactioncreate/{}", method_segment(&request.method));
        let url = self
            .base
            .join(&path)
            .map_err(|e| GatewayError::Config(format!("invalid endpoint '{}': {}", path, e)))?;

        tracing::debug!(order_id = %request.reference_id, %path, "creating pakasir charge");
        let response = self
            .client
            .post(url)
            .json(&json!({
                "project": self.project,
                "order_id": request.reference_id,
                "amount": whole_units(request.amount_cents)?,
                "api_key": self.access_token().await?,
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(GatewayError::Rejected(format!(
                "charge request returned {}: {}",
                status,
                String::from_utf8_lossy(&body)
            )));
        }

        parse_charge_response(&body)
    }

    async fn create_payout(&self, _request: &PayoutRequest) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported("pakasir"))
    }
}

pub fn parse_charge_response(body: &[u8]) -> Result<Charge, GatewayError> {
    let envelope: ChargeEnvelope =
        serde_json::from_slice(body).map_err(|e| GatewayError::Malformed(e.to_string()))?;
    let payment = envelope
        .payment
        .ok_or_else(|| GatewayError::Malformed("charge response without payment".to_string()))?;

    Ok(Charge {
        payment_code: payment
            .payment_number
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        payment_link: None,
        expires_at: parse_expiry(payment.expired_at.as_deref(), Utc::now()),
    })
}

pub fn parse_payment_callback(body: &[u8]) -> Result<PaymentCallback, GatewayError> {
    let parsed: WebhookBody =
        serde_json::from_slice(body).map_err(|e| GatewayError::Malformed(e.to_string()))?;
    let order_id = parsed.order_id.trim().to_string();
    if order_id.is_empty() {
        return Err(GatewayError::Malformed("order_id is empty".to_string()));
    }

    Ok(PaymentCallback {
        order_id,
        gateway_id: None,
        success: is_success_status(&parsed.status),
    })
}
