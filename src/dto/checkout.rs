use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One requested line. Quantity comes from the client; the unit price is
/// always looked up server-side.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub cart_items: Vec<CheckoutItem>,
    pub shipping_address: String,
    /// Pickup-point / service identifier from the carrier widget.
    pub service_id: String,
    pub carrier_name: String,
    /// Shipping cost in PLN minor units, carried verbatim to the payment
    /// session and never discounted.
    pub shipping_cost_pln: i64,
    pub coupon_code: Option<String>,
}

/// Discounted line snapshot serialized into the payment-session metadata so
/// the webhook handler can persist order items without re-reading the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionItemSnapshot {
    pub product_id: Uuid,
    pub quantity: i64,
    /// Total charged for the line after the discount, minor units.
    pub line_amount_pln: i64,
}

/// Redirect target for the hosted payment page.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    pub url: String,
}
