use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::gateway::ChargeResponse;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChargeRequest {
    /// Gateway payment type, e.g. `bank_transfer`, `qris`, `gopay`.
    pub payment_type: String,
    /// Method-specific options forwarded to the gateway verbatim,
    /// e.g. `{"bank_transfer": {"bank": "bca"}}`.
    #[schema(value_type = Object)]
    pub payment_options: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentInstructions {
    pub order_id: Uuid,
    pub order_number: String,
    pub gross_amount: i64,
    /// Hard deadline after which the order expires.
    pub payment_deadline: DateTime<Utc>,
    pub instructions: ChargeResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStatus {
    pub transaction_status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckStatusResponse {
    /// One of `pending`, `success`, `error`, `expired`.
    pub status: String,
    pub payment_status: Option<PaymentStatus>,
    /// Set on success; the client hard-redirects here.
    pub redirect: Option<String>,
}
