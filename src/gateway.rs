use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

/// Transaction statuses the gateway reports. Settlement and capture are
/// settled; deny, cancel and failure end the attempt; expire ends the
/// whole payment window.
pub mod transaction_status {
    pub const PENDING: &str = "pending";
    pub const SETTLEMENT: &str = "settlement";
    pub const CAPTURE: &str = "capture";
    pub const DENY: &str = "deny";
    pub const CANCEL: &str = "cancel";
    pub const EXPIRE: &str = "expire";
    pub const FAILURE: &str = "failure";

    pub fn is_settled(status: &str) -> bool {
        matches!(status, SETTLEMENT | CAPTURE)
    }

    pub fn is_attempt_failure(status: &str) -> bool {
        matches!(status, DENY | CANCEL | FAILURE)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway unreachable: {0}")]
    Unreachable(String),

    #[error("charge rejected: {0}")]
    ChargeRejected(String),

    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VaNumber {
    pub bank: String,
    pub va_number: String,
}

/// Payment instructions returned by a successful charge. Shown to the
/// user verbatim so they can complete payment out-of-band.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChargeResponse {
    pub transaction_id: Option<String>,
    pub transaction_status: String,
    pub payment_type: Option<String>,
    pub va_numbers: Option<Vec<VaNumber>>,
    pub qr_string: Option<String>,
    pub redirect_url: Option<String>,
    pub expiry_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChargeBody {
    status_code: Option<String>,
    status_message: Option<String>,
    transaction_id: Option<String>,
    transaction_status: Option<String>,
    payment_type: Option<String>,
    va_numbers: Option<Vec<VaNumber>>,
    qr_string: Option<String>,
    redirect_url: Option<String>,
    expiry_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub transaction_status: String,
    pub status_message: Option<String>,
}

#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    server_key: String,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>, server_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
            server_key: server_key.into(),
        }
    }

    /// Create a charge for an order. The gateway deduplicates by order
    /// number, so re-submitting for the same order supersedes earlier
    /// instructions instead of double-charging.
    pub async fn charge(
        &self,
        order_number: &str,
        gross_amount: i64,
        payment_type: &str,
        payment_options: Option<&Map<String, Value>>,
    ) -> Result<ChargeResponse, GatewayError> {
        let mut body = Map::new();
        body.insert("payment_type".into(), Value::String(payment_type.into()));
        body.insert(
            "transaction_details".into(),
            serde_json::json!({
                "order_id": order_number,
                "gross_amount": gross_amount,
            }),
        );
        if let Some(options) = payment_options {
            for (key, value) in options {
                body.insert(key.clone(), value.clone());
            }
        }

        let url = format!("{}/v2/charge", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.server_key, Some(""))
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::ChargeRejected(format!(
                "{status}: {message}"
            )));
        }

        let parsed: ChargeBody = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        // The gateway answers 200 even for rejected charges and carries
        // the real verdict in status_code.
        if let Some(code) = parsed
            .status_code
            .as_deref()
            .and_then(|c| c.parse::<u16>().ok())
        {
            if code >= 400 {
                return Err(GatewayError::ChargeRejected(
                    parsed
                        .status_message
                        .unwrap_or_else(|| format!("status code {code}")),
                ));
            }
        }

        let transaction_status = parsed
            .transaction_status
            .ok_or_else(|| GatewayError::Malformed("missing transaction_status".into()))?;

        Ok(ChargeResponse {
            transaction_id: parsed.transaction_id,
            transaction_status,
            payment_type: parsed.payment_type,
            va_numbers: parsed.va_numbers,
            qr_string: parsed.qr_string,
            redirect_url: parsed.redirect_url,
            expiry_time: parsed.expiry_time,
        })
    }

    /// Poll the transaction status for an order. `None` means the gateway
    /// has no transaction for that order yet.
    pub async fn transaction_status(
        &self,
        order_number: &str,
    ) -> Result<Option<StatusBody>, GatewayError> {
        let url = format!("{}/v2/{}/status", self.base_url, order_number);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.server_key, Some(""))
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(GatewayError::Unreachable(format!(
                "gateway returned {}",
                response.status()
            )));
        }

        let body: StatusBody = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        Ok(Some(body))
    }
}
