use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::addresses::{AddressList, CreateAddressRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Address,
    response::{ApiResponse, Meta},
};

fn require_field(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

pub async fn list_addresses(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<AddressList>> {
    let items = sqlx::query_as::<_, Address>(
        "SELECT * FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC",
    )
    .bind(user.user_id)
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::success(
        "OK",
        AddressList { items },
        Some(Meta::empty()),
    ))
}

pub async fn create_address(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    require_field(&payload.name, "name")?;
    require_field(&payload.phone, "phone")?;
    require_field(&payload.address, "address")?;
    require_field(&payload.city, "city")?;
    require_field(&payload.postal_code, "postal_code")?;

    let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM addresses WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;

    // The first saved address becomes the default.
    let is_default = payload.is_default || existing.0 == 0;
    if is_default {
        sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1")
            .bind(user.user_id)
            .execute(pool)
            .await?;
    }

    let address: Address = sqlx::query_as(
        r#"
        INSERT INTO addresses (id, user_id, name, phone, address, city, postal_code, label, is_default)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.name.trim())
    .bind(payload.phone.trim())
    .bind(payload.address.trim())
    .bind(payload.city.trim())
    .bind(payload.postal_code.trim())
    .bind(payload.label)
    .bind(is_default)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "address_create",
        Some("addresses"),
        Some(serde_json::json!({ "address_id": address.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Address saved", address, None))
}

/// Orders keep their own snapshot of the shipping address, so deleting a
/// saved address never touches order history.
pub async fn delete_address(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "address_delete",
        Some("addresses"),
        Some(serde_json::json!({ "address_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Address deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
