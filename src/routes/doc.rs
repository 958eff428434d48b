use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        addresses::{AddressList, CreateAddressRequest},
        cart::{AddToCartRequest, CartItemDto, CartList},
        categories::{CategoryList, CreateCategoryRequest},
        orders::{
            AddressOption, CheckoutAddress, CheckoutRequest, CheckoutResponse, OrderList,
            OrderWithItems,
        },
        payments::{ChargeRequest, CheckStatusResponse, PaymentInstructions, PaymentStatus},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        shipping::{RateQuote, RateRequest, ShippingOption},
    },
    gateway::{ChargeResponse, VaNumber},
    models::{Address, CartItem, Category, Order, OrderItem, Product, User},
    response::{ApiResponse, Meta},
    routes::{
        addresses, admin, auth, cart, categories, health, orders, params, payments,
        products as product_routes, shipping,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        product_routes::list_products,
        product_routes::create_product,
        product_routes::get_product,
        product_routes::update_product,
        product_routes::delete_product,
        categories::list_categories,
        categories::create_category,
        categories::delete_category,
        addresses::list_addresses,
        addresses::create_address,
        addresses::delete_address,
        shipping::rates,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        payments::create_charge,
        payments::check_status,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_low_stock,
        admin::adjust_inventory,
        admin::list_users,
        admin::delete_user
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            CartItem,
            Address,
            Order,
            OrderItem,
            AddToCartRequest,
            CartList,
            CartItemDto,
            CategoryList,
            CreateCategoryRequest,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            AddressList,
            CreateAddressRequest,
            RateRequest,
            RateQuote,
            ShippingOption,
            AddressOption,
            CheckoutAddress,
            CheckoutRequest,
            CheckoutResponse,
            OrderList,
            OrderWithItems,
            ChargeRequest,
            ChargeResponse,
            VaNumber,
            PaymentInstructions,
            PaymentStatus,
            CheckStatusResponse,
            admin::ProductList,
            admin::UpdateOrderStatusRequest,
            admin::InventoryAdjustRequest,
            admin::LowStockQuery,
            admin::UserSummary,
            admin::UserList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<PaymentInstructions>,
            ApiResponse<CheckStatusResponse>,
            ApiResponse<RateQuote>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Product endpoints"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Addresses", description = "Saved address endpoints"),
        (name = "Shipping", description = "Shipping rate lookup"),
        (name = "Orders", description = "Order and checkout endpoints"),
        (name = "Payments", description = "Payment gateway endpoints"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
