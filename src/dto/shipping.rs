use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RateRequest {
    pub destination: String,
    /// Total parcel weight in grams.
    pub weight: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShippingOption {
    pub name: String,
    pub courier_name: String,
    pub cost: i64,
    pub formatted_cost: String,
    pub estimate: String,
    pub formatted_estimate: String,
}

/// Rate lookup result. The fallback variant is a deliberately distinct
/// shape so clients cannot mistake local estimates for live quotes.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum RateQuote {
    Live {
        options: Vec<ShippingOption>,
    },
    Fallback {
        fallback_options: Vec<ShippingOption>,
        message: String,
        example_cities: Vec<String>,
    },
}

impl RateQuote {
    pub fn options(&self) -> &[ShippingOption] {
        match self {
            RateQuote::Live { options } => options,
            RateQuote::Fallback {
                fallback_options, ..
            } => fallback_options,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, RateQuote::Fallback { .. })
    }
}
