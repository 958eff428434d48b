use chrono::{Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, FromQueryResult,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{AddressOption, CheckoutAddress, CheckoutRequest, CheckoutResponse, OrderList, OrderWithItems},
    entity::{
        addresses::ActiveModel as AddressActive,
        addresses::Column as AddressCol,
        addresses::Entity as Addresses,
        cart_items::{self, Column as CartCol, Entity as CartItems},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Address, Order, OrderItem, order_status},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::shipping_service,
    state::AppState,
};

#[derive(Debug, FromQueryResult)]
struct CartProductRow {
    product_id: Uuid,
    quantity: i32,
    price: i64,
    stock: i32,
    weight_grams: Option<i32>,
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Turn the caller's cart plus an address choice and a shipping selection
/// into a persisted order. Prices are snapshotted at submission time and
/// stock is reserved inside the same transaction; validation failures
/// leave the cart and any saved addresses untouched.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    if payload.shipping_method.trim().is_empty() {
        return Err(AppError::BadRequest("shipping_method is required".into()));
    }
    if payload.shipping_cost < 0 {
        return Err(AppError::BadRequest(
            "shipping_cost must not be negative".into(),
        ));
    }

    let destination = resolve_destination(state, user, &payload).await?;

    // Pre-read the cart (unlocked) so the shipping re-check happens before
    // any row locks are taken. The courier call must not run inside the
    // checkout transaction.
    let preview = cart_rows(&state.orm, user.user_id, false).await?;
    if preview.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    let weight_grams: i64 = preview
        .iter()
        .map(|row| shipping_service::line_weight_grams(row.weight_grams, row.quantity))
        .sum();

    // The client submits whatever (method, cost) pair it last fetched, so
    // the pair is re-verified against a fresh quote for this destination.
    let quote = shipping_service::quote_rates(state, &destination.city, weight_grams).await?;
    let matches = quote
        .options()
        .iter()
        .any(|o| o.name == payload.shipping_method && o.cost == payload.shipping_cost);
    if !matches {
        return Err(AppError::BadRequest(format!(
            "shipping selection does not match available rates for {}",
            destination.city
        )));
    }

    let txn = state.orm.begin().await?;

    let rows = cart_rows(&txn, user.user_id, true).await?;
    if rows.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let mut subtotal: i64 = 0;
    for row in &rows {
        if row.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        if row.stock < row.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for product {}",
                row.product_id
            )));
        }
        subtotal += row.price * i64::from(row.quantity);
    }
    let total_amount = subtotal + payload.shipping_cost;

    if payload.address_option == AddressOption::New && payload.save_address {
        save_checkout_address(&txn, user.user_id, &destination, payload.address_label.clone())
            .await?;
    }

    let now = Utc::now();
    let order_id = Uuid::new_v4();
    let order_number = build_order_number(order_id);

    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        order_number: Set(order_number),
        status: Set(order_status::PENDING.into()),
        total_amount: Set(total_amount),
        shipping_name: Set(destination.name.clone()),
        shipping_phone: Set(destination.phone.clone()),
        shipping_address: Set(destination.address.clone()),
        shipping_city: Set(destination.city.clone()),
        shipping_postal_code: Set(destination.postal_code.clone()),
        shipping_method: Set(payload.shipping_method.clone()),
        shipping_cost: Set(payload.shipping_cost),
        payment_expires_at: Set((now + Duration::hours(state.payment_window_hours)).into()),
        paid_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::new();

    for row in &rows {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(row.product_id),
            quantity: Set(row.quantity),
            price: Set(row.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        order_items.push(order_item_from_entity(item));

        // Reserve stock for the payment window.
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(row.quantity))
            .filter(ProdCol::Id.eq(row.product_id))
            .exec(&txn)
            .await?;
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "order_number": order.order_number })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let payment_redirect = format!("/api/payments/{}", order.id);
    Ok(ApiResponse::success(
        "Checkout success",
        CheckoutResponse {
            order: order_from_entity(order),
            items: order_items,
            payment_redirect,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Compare-and-swap status transition. Returns whether this writer won;
/// a `false` means another writer (payment poller, sweeper or admin)
/// moved the order first.
pub(crate) async fn transition_status<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    from: &[&str],
    to: &str,
) -> AppResult<bool> {
    let result = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(to))
        .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now()))
        .filter(OrderCol::Id.eq(order_id))
        .filter(OrderCol::Status.is_in(from.iter().copied()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Return reserved stock to inventory. Callers must only invoke this
/// after winning the status transition that retires the order, so the
/// release happens exactly once.
pub(crate) async fn release_order_stock<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<()> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(conn)
        .await?;

    for item in items {
        Products::update_many()
            .col_expr(
                ProdCol::Stock,
                Expr::col(ProdCol::Stock).add(item.quantity),
            )
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(conn)
            .await?;
    }

    Ok(())
}

async fn cart_rows<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    lock: bool,
) -> AppResult<Vec<CartProductRow>> {
    let mut finder = CartItems::find()
        .select_only()
        .column_as(CartCol::ProductId, "product_id")
        .column_as(CartCol::Quantity, "quantity")
        .join(JoinType::InnerJoin, cart_items::Relation::Products.def())
        .column_as(ProdCol::Price, "price")
        .column_as(ProdCol::Stock, "stock")
        .column_as(ProdCol::WeightGrams, "weight_grams")
        .filter(CartCol::UserId.eq(user_id));
    if lock {
        finder = finder.lock(LockType::Update);
    }
    let rows = finder.into_model::<CartProductRow>().all(conn).await?;
    Ok(rows)
}

async fn resolve_destination(
    state: &AppState,
    user: &AuthUser,
    payload: &CheckoutRequest,
) -> AppResult<CheckoutAddress> {
    match payload.address_option {
        AddressOption::Saved => {
            let id = payload.selected_address_id.ok_or_else(|| {
                AppError::BadRequest("selected_address_id is required".into())
            })?;
            let saved: Option<Address> =
                sqlx::query_as("SELECT * FROM addresses WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&state.pool)
                    .await?;
            let saved = match saved {
                Some(a) => a,
                None => return Err(AppError::NotFound),
            };
            if saved.user_id != user.user_id {
                return Err(AppError::Forbidden);
            }
            Ok(CheckoutAddress {
                name: saved.name,
                phone: saved.phone,
                address: saved.address,
                city: saved.city,
                postal_code: saved.postal_code,
            })
        }
        AddressOption::New => {
            let address = payload
                .address
                .as_ref()
                .ok_or_else(|| AppError::BadRequest("address is required".into()))?;
            for (value, field) in [
                (&address.name, "name"),
                (&address.phone, "phone"),
                (&address.address, "address"),
                (&address.city, "city"),
                (&address.postal_code, "postal_code"),
            ] {
                if value.trim().is_empty() {
                    return Err(AppError::BadRequest(format!("{field} is required")));
                }
            }
            Ok(CheckoutAddress {
                name: address.name.trim().to_string(),
                phone: address.phone.trim().to_string(),
                address: address.address.trim().to_string(),
                city: address.city.trim().to_string(),
                postal_code: address.postal_code.trim().to_string(),
            })
        }
    }
}

async fn save_checkout_address<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    destination: &CheckoutAddress,
    label: Option<String>,
) -> AppResult<()> {
    let existing = Addresses::find()
        .filter(AddressCol::UserId.eq(user_id))
        .count(conn)
        .await?;

    AddressActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        name: Set(destination.name.clone()),
        phone: Set(destination.phone.clone()),
        address: Set(destination.address.clone()),
        city: Set(destination.city.clone()),
        postal_code: Set(destination.postal_code.clone()),
        label: Set(label),
        is_default: Set(existing == 0),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;

    Ok(())
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        order_number: model.order_number,
        status: model.status,
        total_amount: model.total_amount,
        shipping_name: model.shipping_name,
        shipping_phone: model.shipping_phone,
        shipping_address: model.shipping_address,
        shipping_city: model.shipping_city,
        shipping_postal_code: model.shipping_postal_code,
        shipping_method: model.shipping_method,
        shipping_cost: model.shipping_cost,
        payment_expires_at: model.payment_expires_at.with_timezone(&Utc),
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn build_order_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.simple().to_string();
    format!("ORD-{}-{}", date, &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::build_order_number;
    use uuid::Uuid;

    #[test]
    fn order_number_embeds_date_and_id_prefix() {
        let id = Uuid::new_v4();
        let number = build_order_number(id);
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2], &id.simple().to_string()[..8]);
    }
}
