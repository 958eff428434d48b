use crate::{
    courier::{CourierError, CourierRate},
    dto::shipping::{RateQuote, RateRequest, ShippingOption},
    error::{AppError, AppResult},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Products without a declared weight count as one kilogram.
pub const DEFAULT_ITEM_WEIGHT_GRAMS: i64 = 1000;

/// Destinations the fallback message can suggest to the user.
const EXAMPLE_CITIES: [&str; 5] = ["Jakarta", "Bandung", "Surabaya", "Yogyakarta", "Medan"];

pub fn line_weight_grams(weight_grams: Option<i32>, quantity: i32) -> i64 {
    let unit = weight_grams.map(i64::from).unwrap_or(DEFAULT_ITEM_WEIGHT_GRAMS);
    unit * i64::from(quantity)
}

pub async fn rates(state: &AppState, payload: RateRequest) -> AppResult<ApiResponse<RateQuote>> {
    let quote = quote_rates(state, &payload.destination, payload.weight).await?;
    let message = if quote.is_fallback() {
        "Estimated rates"
    } else {
        "Rates"
    };
    Ok(ApiResponse::success(message, quote, Some(Meta::empty())))
}

/// Quote shipping options for a destination city and a parcel weight.
/// Unknown cities and courier outages degrade to local estimates in a
/// distinct response shape; only a malformed courier response bubbles up.
pub async fn quote_rates(
    state: &AppState,
    destination: &str,
    weight_grams: i64,
) -> AppResult<RateQuote> {
    if destination.trim().is_empty() {
        return Err(AppError::BadRequest("destination is required".into()));
    }
    if weight_grams <= 0 {
        return Err(AppError::BadRequest(
            "weight must be greater than 0".into(),
        ));
    }

    match state.courier.fetch_rates(destination.trim(), weight_grams).await {
        Ok(rates) => {
            let mut options: Vec<ShippingOption> =
                rates.into_iter().map(option_from_rate).collect();
            options.sort_by_key(|o| o.cost);
            Ok(RateQuote::Live { options })
        }
        Err(CourierError::UnknownCity) => {
            tracing::debug!(destination, "courier does not know destination, falling back");
            Ok(fallback_quote(
                weight_grams,
                "Destination not recognized, showing estimated rates",
            ))
        }
        Err(CourierError::Unavailable(reason)) => {
            tracing::warn!(error = %reason, "courier rate lookup unavailable, falling back");
            Ok(fallback_quote(
                weight_grams,
                "Live rates unavailable, showing estimated rates",
            ))
        }
        Err(CourierError::Malformed(reason)) => Err(AppError::ExternalService(reason)),
    }
}

fn fallback_quote(weight_grams: i64, message: &str) -> RateQuote {
    RateQuote::Fallback {
        fallback_options: fallback_options(weight_grams),
        message: message.to_string(),
        example_cities: EXAMPLE_CITIES.iter().map(|c| c.to_string()).collect(),
    }
}

/// Locally computed estimates used when the courier API cannot answer.
/// Flat per-kilogram pricing, rounded up to the next kilogram.
pub fn fallback_options(weight_grams: i64) -> Vec<ShippingOption> {
    let kilograms = ((weight_grams as u64).div_ceil(1000) as i64).max(1);
    let tiers: [(&str, &str, i64, &str); 2] = [
        ("REG", "Estimated Regular", 9_000, "3-5"),
        ("EXP", "Estimated Express", 16_000, "1-2"),
    ];

    tiers
        .iter()
        .map(|(name, courier, per_kg, etd)| {
            let cost = per_kg * kilograms;
            ShippingOption {
                name: name.to_string(),
                courier_name: courier.to_string(),
                cost,
                formatted_cost: format_rupiah(cost),
                estimate: etd.to_string(),
                formatted_estimate: format!("{etd} days"),
            }
        })
        .collect()
}

fn option_from_rate(rate: CourierRate) -> ShippingOption {
    ShippingOption {
        name: rate.service,
        courier_name: rate.courier,
        cost: rate.cost,
        formatted_cost: format_rupiah(rate.cost),
        estimate: rate.etd.clone(),
        formatted_estimate: format!("{} days", rate.etd),
    }
}

/// "Rp" plus dot-grouped thousands, e.g. 25000 -> "Rp25.000".
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-Rp{grouped}")
    } else {
        format!("Rp{grouped}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rupiah_formatting_groups_thousands() {
        assert_eq!(format_rupiah(0), "Rp0");
        assert_eq!(format_rupiah(950), "Rp950");
        assert_eq!(format_rupiah(25_000), "Rp25.000");
        assert_eq!(format_rupiah(1_250_000), "Rp1.250.000");
    }

    #[test]
    fn fallback_costs_scale_with_weight_and_stay_ranked() {
        let light = fallback_options(400);
        let heavy = fallback_options(2_500);

        // 400 g rounds up to 1 kg, 2 500 g to 3 kg.
        assert_eq!(light[0].cost, 9_000);
        assert_eq!(heavy[0].cost, 27_000);
        assert!(light.windows(2).all(|w| w[0].cost <= w[1].cost));
        assert!(heavy.windows(2).all(|w| w[0].cost <= w[1].cost));
    }

    #[test]
    fn line_weight_defaults_to_one_kilogram() {
        assert_eq!(line_weight_grams(None, 2), 2_000);
        assert_eq!(line_weight_grams(Some(250), 4), 1_000);
    }
}
