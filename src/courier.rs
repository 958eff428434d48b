use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failures from the courier-rate API. Unknown destinations and outages
/// are recoverable (the caller falls back to local estimates); only a
/// malformed response body is surfaced to the user as-is.
#[derive(Debug, Error)]
pub enum CourierError {
    #[error("destination not recognized")]
    UnknownCity,

    #[error("courier service unavailable: {0}")]
    Unavailable(String),

    #[error("malformed courier response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourierRate {
    pub service: String,
    pub courier: String,
    pub cost: i64,
    /// Estimated delivery in days, e.g. "2-3".
    pub etd: String,
}

#[derive(Debug, Deserialize)]
struct RatesBody {
    options: Vec<CourierRate>,
}

#[derive(Debug, Serialize)]
struct RatesRequest<'a> {
    destination: &'a str,
    weight: i64,
}

#[derive(Clone)]
pub struct CourierClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CourierClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Look up live rates for a destination city and a total weight in grams.
    pub async fn fetch_rates(
        &self,
        destination: &str,
        weight_grams: i64,
    ) -> Result<Vec<CourierRate>, CourierError> {
        let url = format!("{}/rates", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&RatesRequest {
                destination,
                weight: weight_grams,
            })
            .send()
            .await
            .map_err(|e| CourierError::Unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CourierError::UnknownCity);
        }
        if !response.status().is_success() {
            return Err(CourierError::Unavailable(format!(
                "courier returned {}",
                response.status()
            )));
        }

        let body: RatesBody = response
            .json()
            .await
            .map_err(|e| CourierError::Malformed(e.to_string()))?;

        Ok(body.options)
    }
}
