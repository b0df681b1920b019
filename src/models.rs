use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A candle in the catalog. `price_pln` is in minor units (grosze).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_pln: i64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// A coupon grants at most one of `percent_off` / `amount_off_pln`.
/// Codes compare case-insensitively. `redemptions_count` only ever grows.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub percent_off: Option<i32>,
    pub amount_off_pln: Option<i64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub max_redemptions: Option<i32>,
    pub redemptions_count: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_session_id: String,
    pub total_pln: i64,
    pub total_eur: i64,
    pub shipping_cost_pln: i64,
    pub shipping_cost_eur: i64,
    pub discount_pln: i64,
    pub coupon_code: Option<String>,
    pub status: String,
    pub shipping_address: String,
    pub service_id: String,
    pub carrier_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `amount_pln` is the discounted line total charged, not a unit price;
/// item amounts plus shipping add up to the order's `total_pln`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub amount_pln: i64,
    pub created_at: DateTime<Utc>,
}

/// Order lifecycle. Transitions are driven by admin actions or the carrier
/// webhook, never by pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Paid,
    Accepted,
    Cancelled,
    Shipped,
    Delivered,
}

impl OrderStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paid" => Some(OrderStatus::Paid),
            "accepted" => Some(OrderStatus::Accepted),
            "cancelled" => Some(OrderStatus::Cancelled),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Paid => "paid",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
        }
    }

    /// paid -> accepted | cancelled, accepted -> shipped, shipped -> delivered.
    /// Cancelled and delivered are terminal.
    pub fn can_transition(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Paid, OrderStatus::Accepted)
                | (OrderStatus::Paid, OrderStatus::Cancelled)
                | (OrderStatus::Accepted, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for s in ["paid", "accepted", "cancelled", "shipped", "delivered"] {
            assert_eq!(OrderStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(OrderStatus::parse("refunded").is_none());
    }

    #[test]
    fn allowed_transitions() {
        use OrderStatus::*;
        assert!(Paid.can_transition(Accepted));
        assert!(Paid.can_transition(Cancelled));
        assert!(Accepted.can_transition(Shipped));
        assert!(Shipped.can_transition(Delivered));
    }

    #[test]
    fn rejected_transitions() {
        use OrderStatus::*;
        assert!(!Paid.can_transition(Shipped));
        assert!(!Paid.can_transition(Delivered));
        assert!(!Cancelled.can_transition(Shipped));
        assert!(!Delivered.can_transition(Paid));
        assert!(!Shipped.can_transition(Accepted));
    }
}
