use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub weight_grams: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub label: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub status: String,
    pub total_amount: i64,
    pub shipping_name: String,
    pub shipping_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal_code: String,
    pub shipping_method: String,
    pub shipping_cost: i64,
    pub payment_expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Line total at the snapshotted price.
    pub fn total(&self) -> i64 {
        self.price * i64::from(self.quantity)
    }
}

pub mod order_status {
    pub const PENDING: &str = "pending";
    pub const PAID: &str = "paid";
    pub const PROCESSING: &str = "processing";
    pub const SHIPPED: &str = "shipped";
    pub const COMPLETED: &str = "completed";
    pub const CANCELLED: &str = "cancelled";
    pub const PAYMENT_FAILED: &str = "payment_failed";
    pub const EXPIRED: &str = "expired";

    /// Statuses an admin may set directly.
    pub const ADMIN_SETTABLE: [&str; 5] = [PAID, PROCESSING, SHIPPED, COMPLETED, CANCELLED];

    /// States an order can still move out of. Expired, cancelled and
    /// completed orders stay where they are.
    pub const LIVE: [&str; 5] = [PENDING, PAID, PROCESSING, SHIPPED, PAYMENT_FAILED];

    pub fn is_admin_settable(status: &str) -> bool {
        ADMIN_SETTABLE.contains(&status)
    }

    pub fn is_live(status: &str) -> bool {
        LIVE.contains(&status)
    }

    /// Stock reserved at checkout is still held in these states.
    pub fn holds_stock(status: &str) -> bool {
        matches!(status, PENDING | PAYMENT_FAILED)
    }
}

#[cfg(test)]
mod tests {
    use super::order_status;

    #[test]
    fn admin_cannot_set_machine_states() {
        assert!(!order_status::is_admin_settable(order_status::PENDING));
        assert!(!order_status::is_admin_settable(order_status::EXPIRED));
        assert!(!order_status::is_admin_settable(
            order_status::PAYMENT_FAILED
        ));
        assert!(order_status::is_admin_settable(order_status::SHIPPED));
    }

    #[test]
    fn terminal_states_are_not_live() {
        assert!(!order_status::is_live(order_status::EXPIRED));
        assert!(!order_status::is_live(order_status::CANCELLED));
        assert!(!order_status::is_live(order_status::COMPLETED));
        assert!(order_status::is_live(order_status::PENDING));
    }
}
