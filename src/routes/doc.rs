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
        cart::{CartItemDto, CartList},
        checkout::{CheckoutItem, CheckoutRequest, CheckoutResponse},
        coupons::{CouponList, CreateCouponRequest},
        orders::{CarrierStatusUpdate, OrderList, OrderWithItems, UpdateOrderStatusRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        rates::{RateQuery, RateResponse},
    },
    models::{CartItem, Coupon, Order, OrderItem, OrderStatus, Product},
    response::{ApiResponse, Meta},
    routes::{admin, cart, checkout, health, orders, params, products, rates, webhooks},
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
        products::list_products,
        products::get_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        checkout::checkout,
        orders::list_orders,
        orders::get_order,
        rates::get_rate,
        rates::get_country,
        webhooks::payment_webhook,
        webhooks::shipping_webhook,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::create_product,
        admin::update_product,
        admin::delete_product,
        admin::list_low_stock,
        admin::list_coupons,
        admin::create_coupon,
        admin::deactivate_coupon
    ),
    components(
        schemas(
            Product,
            CartItem,
            Coupon,
            Order,
            OrderItem,
            OrderStatus,
            CartList,
            CartItemDto,
            CheckoutItem,
            CheckoutRequest,
            CheckoutResponse,
            CouponList,
            CreateCouponRequest,
            OrderList,
            OrderWithItems,
            UpdateOrderStatusRequest,
            CarrierStatusUpdate,
            ProductList,
            CreateProductRequest,
            UpdateProductRequest,
            RateQuery,
            RateResponse,
            rates::CountryGuess,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::LowStockQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<RateResponse>,
            ApiResponse<CouponList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Candle catalog"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Checkout", description = "Checkout and payment session creation"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Rates", description = "Display-currency rate proxy"),
        (name = "Webhooks", description = "Payment and carrier callbacks"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
