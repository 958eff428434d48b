use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::shipping::{RateQuote, RateRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::shipping_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/rates", post(rates))
}

#[utoipa::path(
    post,
    path = "/api/shipping/rates",
    request_body = RateRequest,
    responses(
        (status = 200, description = "Live rates, or a fallback-estimate shape when the courier cannot answer", body = ApiResponse<RateQuote>),
        (status = 400, description = "Missing destination or non-positive weight"),
        (status = 502, description = "Courier returned a malformed response"),
    ),
    security(("bearer_auth" = [])),
    tag = "Shipping"
)]
pub async fn rates(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<RateRequest>,
) -> AppResult<Json<ApiResponse<RateQuote>>> {
    let resp = shipping_service::rates(&state, payload).await?;
    Ok(Json(resp))
}
