use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QuerySelect, TransactionTrait};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::OrmConn,
    dto::payments::{ChargeRequest, CheckStatusResponse, PaymentInstructions, PaymentStatus},
    entity::orders::{Column as OrderCol, Entity as Orders, Model as OrderModel},
    error::{AppError, AppResult},
    gateway::{GatewayError, transaction_status},
    middleware::auth::AuthUser,
    models::order_status,
    response::{ApiResponse, Meta},
    services::order_service,
    state::AppState,
};

/// Wire statuses for the check-status endpoint.
mod poll_status {
    pub const PENDING: &str = "pending";
    pub const SUCCESS: &str = "success";
    pub const ERROR: &str = "error";
    pub const EXPIRED: &str = "expired";
}

/// Create a gateway charge for an order. Allowed while the order is
/// `pending` or retrying after `payment_failed`, and only inside the
/// payment window. The gateway deduplicates per order number, so a
/// repeat charge supersedes earlier instructions instead of
/// double-charging.
pub async fn create_charge(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: ChargeRequest,
) -> AppResult<ApiResponse<PaymentInstructions>> {
    let order = find_user_order(state, user, order_id).await?;

    if order_status::holds_stock(&order.status) && deadline_passed(&order) {
        expire_order(&state.orm, order.id).await?;
        return Err(AppError::Expired("payment window has elapsed".into()));
    }

    match order.status.as_str() {
        order_status::PENDING => {}
        order_status::PAYMENT_FAILED => {
            // A retry rejoins the pending flow before the new charge.
            let won = order_service::transition_status(
                &state.orm,
                order.id,
                &[order_status::PAYMENT_FAILED],
                order_status::PENDING,
            )
            .await?;
            if !won {
                return Err(AppError::Conflict(
                    "order status changed, reload and retry".into(),
                ));
            }
        }
        other => {
            return Err(AppError::BadRequest(format!(
                "order is {other} and cannot be charged"
            )));
        }
    }

    let options = payload
        .payment_options
        .as_ref()
        .and_then(|value| value.as_object());

    let instructions = state
        .gateway
        .charge(
            &order.order_number,
            order.total_amount,
            &payload.payment_type,
            options,
        )
        .await
        .map_err(gateway_error)?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_charge",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "payment_type": payload.payment_type,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Charge created",
        PaymentInstructions {
            order_id: order.id,
            order_number: order.order_number,
            gross_amount: order.total_amount,
            payment_deadline: order.payment_expires_at.with_timezone(&Utc),
            instructions,
        },
        Some(Meta::empty()),
    ))
}

/// Report where an order's payment stands. Local knowledge wins; an
/// order past its deadline reports `expired` (never `pending`) and the
/// gateway is only polled for orders that are still live. Repeated
/// calls are idempotent: stock release rides on the status transition,
/// which fires once.
pub async fn check_status(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<CheckStatusResponse>> {
    let order = find_user_order(state, user, order_id).await?;

    if order_status::holds_stock(&order.status) && deadline_passed(&order) {
        expire_order(&state.orm, order.id).await?;
        return Ok(status_response(poll_status::EXPIRED, None, None));
    }

    match order.status.as_str() {
        order_status::PAID
        | order_status::PROCESSING
        | order_status::SHIPPED
        | order_status::COMPLETED => {
            return Ok(status_response(
                poll_status::SUCCESS,
                None,
                Some(order_redirect(order.id)),
            ));
        }
        order_status::EXPIRED => {
            return Ok(status_response(poll_status::EXPIRED, None, None));
        }
        order_status::CANCELLED | order_status::PAYMENT_FAILED => {
            return Ok(status_response(poll_status::ERROR, None, None));
        }
        _ => {}
    }

    let polled = state
        .gateway
        .transaction_status(&order.order_number)
        .await
        .map_err(gateway_error)?;

    let Some(polled) = polled else {
        // No transaction yet: the user has not picked a method.
        return Ok(status_response(poll_status::PENDING, None, None));
    };

    let status = polled.transaction_status;

    if transaction_status::is_settled(&status) {
        let won = order_service::transition_status(
            &state.orm,
            order.id,
            &[order_status::PENDING],
            order_status::PAID,
        )
        .await?;
        if won {
            mark_paid_at(&state.orm, order.id).await?;
            if let Err(err) = log_audit(
                &state.pool,
                Some(user.user_id),
                "payment_settled",
                Some("orders"),
                Some(serde_json::json!({ "order_id": order.id })),
            )
            .await
            {
                tracing::warn!(error = %err, "audit log failed");
            }
        }
        return Ok(status_response(
            poll_status::SUCCESS,
            Some(status),
            Some(order_redirect(order.id)),
        ));
    }

    if status == transaction_status::EXPIRE {
        expire_order(&state.orm, order.id).await?;
        return Ok(status_response(poll_status::EXPIRED, Some(status), None));
    }

    if transaction_status::is_attempt_failure(&status) {
        let won = order_service::transition_status(
            &state.orm,
            order.id,
            &[order_status::PENDING],
            order_status::PAYMENT_FAILED,
        )
        .await?;
        if won {
            if let Err(err) = log_audit(
                &state.pool,
                Some(user.user_id),
                "payment_failed",
                Some("orders"),
                Some(serde_json::json!({ "order_id": order.id, "transaction_status": status })),
            )
            .await
            {
                tracing::warn!(error = %err, "audit log failed");
            }
        }
        return Ok(status_response(poll_status::ERROR, Some(status), None));
    }

    Ok(status_response(poll_status::PENDING, Some(status), None))
}

/// Expire one order: flip it to `expired` and return its reserved stock.
/// The compare-and-swap makes the release exactly-once no matter how
/// many pollers and sweepers race here.
pub async fn expire_order(orm: &OrmConn, order_id: Uuid) -> AppResult<bool> {
    let txn = orm.begin().await?;
    let won = order_service::transition_status(
        &txn,
        order_id,
        &[order_status::PENDING, order_status::PAYMENT_FAILED],
        order_status::EXPIRED,
    )
    .await?;
    if won {
        order_service::release_order_stock(&txn, order_id).await?;
    }
    txn.commit().await?;
    if won {
        tracing::info!(%order_id, "order expired, reserved stock released");
    }
    Ok(won)
}

/// Sweep all orders whose payment deadline has passed. Runs on an
/// interval so expiry does not depend on a client still polling.
pub async fn expire_overdue(orm: &OrmConn) -> AppResult<u64> {
    let overdue: Vec<Uuid> = Orders::find()
        .select_only()
        .column(OrderCol::Id)
        .filter(
            Condition::all()
                .add(
                    OrderCol::Status
                        .is_in([order_status::PENDING, order_status::PAYMENT_FAILED]),
                )
                .add(OrderCol::PaymentExpiresAt.lt(Utc::now())),
        )
        .into_tuple()
        .all(orm)
        .await?;

    let mut expired = 0;
    for order_id in overdue {
        if expire_order(orm, order_id).await? {
            expired += 1;
        }
    }
    Ok(expired)
}

async fn find_user_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<OrderModel> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(order_id)),
        )
        .one(&state.orm)
        .await?;
    match order {
        Some(o) => Ok(o),
        None => Err(AppError::NotFound),
    }
}

async fn mark_paid_at(orm: &OrmConn, order_id: Uuid) -> AppResult<()> {
    Orders::update_many()
        .col_expr(OrderCol::PaidAt, Expr::value(Some(Utc::now())))
        .filter(OrderCol::Id.eq(order_id))
        .exec(orm)
        .await?;
    Ok(())
}

fn deadline_passed(order: &OrderModel) -> bool {
    Utc::now() > order.payment_expires_at.with_timezone(&Utc)
}

fn order_redirect(order_id: Uuid) -> String {
    format!("/api/orders/{order_id}")
}

fn status_response(
    status: &str,
    transaction_status: Option<String>,
    redirect: Option<String>,
) -> ApiResponse<CheckStatusResponse> {
    ApiResponse::success(
        "Payment status",
        CheckStatusResponse {
            status: status.to_string(),
            payment_status: transaction_status
                .map(|transaction_status| PaymentStatus { transaction_status }),
            redirect,
        },
        Some(Meta::empty()),
    )
}

fn gateway_error(err: GatewayError) -> AppError {
    AppError::ExternalService(err.to_string())
}
