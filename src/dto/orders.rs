use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AddressOption {
    Saved,
    New,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutAddress {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub address_option: AddressOption,
    /// Required when address_option is `saved`; must belong to the caller.
    pub selected_address_id: Option<Uuid>,
    /// Required when address_option is `new`.
    pub address: Option<CheckoutAddress>,
    #[serde(default)]
    pub save_address: bool,
    pub address_label: Option<String>,
    pub shipping_method: String,
    pub shipping_cost: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Where the client goes next to complete payment.
    pub payment_redirect: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
