use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::payments::{ChargeRequest, CheckStatusResponse, PaymentInstructions},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{order_id}/core-api", post(create_charge))
        .route("/{order_id}/check-status", get(check_status))
}

#[utoipa::path(
    post,
    path = "/api/payments/{order_id}/core-api",
    params(
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    request_body = ChargeRequest,
    responses(
        (status = 200, description = "Gateway payment instructions", body = ApiResponse<PaymentInstructions>),
        (status = 400, description = "Order is not payable"),
        (status = 404, description = "Not Found"),
        (status = 410, description = "Payment window elapsed"),
        (status = 502, description = "Gateway error; method selection may be retried"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_charge(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<ChargeRequest>,
) -> AppResult<Json<ApiResponse<PaymentInstructions>>> {
    let resp = payment_service::create_charge(&state, &user, order_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/{order_id}/check-status",
    params(
        ("order_id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Payment status: pending, success, error or expired", body = ApiResponse<CheckStatusResponse>),
        (status = 404, description = "Not Found"),
        (status = 502, description = "Gateway unreachable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn check_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CheckStatusResponse>>> {
    let resp = payment_service::check_status(&state, &user, order_id).await?;
    Ok(Json(resp))
}
