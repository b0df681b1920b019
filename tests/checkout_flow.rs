use std::collections::HashMap;

use candle_shop_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        cart::AddToCartRequest,
        checkout::{CheckoutItem, CheckoutRequest, SessionItemSnapshot},
        orders::UpdateOrderStatusRequest,
    },
    entity::{
        coupons::ActiveModel as CouponActive,
        orders::{Column as OrderCol, Entity as Orders},
        products::{ActiveModel as ProductActive, Entity as Products},
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::OrderStatus,
    payments::{CheckoutSession, WebhookEvent, WebhookEventData},
    pricing::Discount,
    services::{cart_service, checkout_service, coupon_service, order_service},
    state::AppState,
};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, Statement};
use uuid::Uuid;

// Integration flow against a real database: coupon redemption, webhook-driven
// order persistence, and admin status transitions. Skipped when no database
// is configured so CI without Postgres stays green.
async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, cart_items, coupons, audit_logs, products RESTART IDENTITY CASCADE",
    ))
    .await?;

    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        payment_api_base: "http://localhost:9".into(),
        payment_secret_key: "sk_test".into(),
        payment_webhook_secret: "whsec_test".into(),
        checkout_success_url: "http://localhost/success".into(),
        checkout_cancel_url: "http://localhost/cancel".into(),
        rate_api_base: "http://localhost:9".into(),
        geo_api_base: "http://localhost:9".into(),
        email_api_url: None,
        email_api_key: None,
        email_from: "orders@test.example".into(),
        admin_alert_email: None,
        carrier_webhook_token: Some("carrier-secret".into()),
    };

    Ok(Some(AppState::new(pool, orm, config)))
}

async fn seed_product(state: &AppState, name: &str, price_pln: i64, stock: i32) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        description: Set(Some("test candle".into())),
        price_pln: Set(price_pln),
        stock: Set(stock),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

#[allow(clippy::too_many_arguments)]
async fn seed_coupon(
    state: &AppState,
    code: &str,
    percent_off: Option<i32>,
    max_redemptions: Option<i32>,
    active: bool,
    valid_from: Option<DateTime<FixedOffset>>,
    valid_to: Option<DateTime<FixedOffset>>,
) -> anyhow::Result<Uuid> {
    let coupon = CouponActive {
        id: Set(Uuid::new_v4()),
        code: Set(code.into()),
        percent_off: Set(percent_off),
        amount_off_pln: Set(None),
        valid_from: Set(valid_from),
        valid_to: Set(valid_to),
        max_redemptions: Set(max_redemptions),
        redemptions_count: Set(0),
        active: Set(active),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(coupon.id)
}

fn paid_session_event(
    session_id: &str,
    user_id: Uuid,
    items: &[SessionItemSnapshot],
    total_pln: i64,
) -> WebhookEvent {
    let mut metadata: HashMap<String, String> = HashMap::new();
    metadata.insert("user_id".into(), user_id.to_string());
    metadata.insert("shipping_address".into(), "Polna 1, Warszawa".into());
    metadata.insert("service_id".into(), "PACZKOMAT-123".into());
    metadata.insert("carrier_name".into(), "inpost".into());
    metadata.insert("shipping_cost_pln".into(), "1500".into());
    metadata.insert("shipping_cost_eur".into(), "345".into());
    metadata.insert("total_pln".into(), total_pln.to_string());
    metadata.insert("total_eur".into(), (total_pln / 4).to_string());
    metadata.insert("discount_pln".into(), "2000".into());
    metadata.insert("coupon_code".into(), "WELCOME10".into());
    metadata.insert("items".into(), serde_json::to_string(items).unwrap());

    WebhookEvent {
        event_type: "checkout.session.completed".into(),
        data: WebhookEventData {
            object: CheckoutSession {
                id: session_id.into(),
                metadata,
                customer_details: None,
                amount_total: Some(total_pln),
            },
        },
    }
}

#[tokio::test]
async fn coupon_redemption_is_capped() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    seed_coupon(&state, "SINGLE10", Some(10), Some(1), true, None, None).await?;

    // Case-insensitive lookup, first redemption succeeds.
    let first = coupon_service::resolve_and_redeem(&state, "single10").await?;
    let (code, discount) = first.expect("first redemption");
    assert_eq!(code, "SINGLE10");
    assert_eq!(discount, Discount::Percent(10));

    // The cap is enforced at the storage layer: the second take misses.
    let second = coupon_service::resolve_and_redeem(&state, "SINGLE10").await?;
    assert!(second.is_none());

    // Unknown codes are a soft miss, not an error.
    let bogus = coupon_service::resolve_and_redeem(&state, "BOGUS").await?;
    assert!(bogus.is_none());

    Ok(())
}

#[tokio::test]
async fn unusable_coupons_are_a_soft_miss() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let hour = Duration::hours(1);
    seed_coupon(&state, "DISABLED", Some(10), None, false, None, None).await?;
    seed_coupon(
        &state,
        "NOTYET",
        Some(10),
        None,
        true,
        Some((Utc::now() + hour).into()),
        None,
    )
    .await?;
    seed_coupon(
        &state,
        "EXPIRED",
        Some(10),
        None,
        true,
        None,
        Some((Utc::now() - hour).into()),
    )
    .await?;

    // Deactivated and out-of-window coupons grant nothing, without error.
    for code in ["DISABLED", "NOTYET", "EXPIRED"] {
        let miss = coupon_service::resolve_and_redeem(&state, code).await?;
        assert!(miss.is_none(), "{code} should not redeem");
    }

    // A window that covers now still redeems.
    seed_coupon(
        &state,
        "CURRENT",
        Some(10),
        None,
        true,
        Some((Utc::now() - hour).into()),
        Some((Utc::now() + hour).into()),
    )
    .await?;
    assert!(coupon_service::resolve_and_redeem(&state, "CURRENT").await?.is_some());

    Ok(())
}

#[tokio::test]
async fn invalid_cart_does_not_burn_a_redemption() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let product_id = seed_product(&state, "Guard Candle", 5_000, 5).await?;
    seed_coupon(&state, "ONCE10", Some(10), Some(1), true, None, None).await?;
    let user = AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    };

    // Negative shipping is rejected before the coupon is touched.
    let rejected = checkout_service::checkout(
        &state,
        &user,
        CheckoutRequest {
            cart_items: vec![CheckoutItem {
                product_id,
                quantity: 1,
            }],
            shipping_address: "Polna 1, Warszawa".into(),
            service_id: "PACZKOMAT-123".into(),
            carrier_name: "inpost".into(),
            shipping_cost_pln: -100,
            coupon_code: Some("ONCE10".into()),
        },
    )
    .await;
    assert!(matches!(rejected, Err(AppError::InvalidCart(_))));

    // The single redemption must still be available afterwards.
    let redeemed = coupon_service::resolve_and_redeem(&state, "ONCE10").await?;
    assert!(redeemed.is_some());

    Ok(())
}

#[tokio::test]
async fn webhook_persists_order_once() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = Uuid::new_v4();
    let product_id = seed_product(&state, "Webhook Candle", 10_000, 10).await?;

    // Cart contents should be cleared by the webhook.
    let auth_user = AuthUser {
        user_id,
        role: "user".into(),
    };
    cart_service::add_to_cart(
        &state,
        &auth_user,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?;

    let items = vec![SessionItemSnapshot {
        product_id,
        quantity: 2,
        line_amount_pln: 18_000,
    }];
    let event = paid_session_event("cs_test_1", user_id, &items, 19_500);
    order_service::handle_payment_event(&state, event).await?;

    let order = Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .one(&state.orm)
        .await?
        .expect("order persisted");
    assert_eq!(order.status, "paid");
    assert_eq!(order.total_pln, 19_500);
    assert_eq!(order.shipping_cost_pln, 1_500);
    assert_eq!(order.coupon_code.as_deref(), Some("WELCOME10"));

    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product");
    assert_eq!(product.stock, 8);

    let cart = cart_service::list_cart(
        &state,
        &auth_user,
        candle_shop_api::routes::params::Pagination {
            page: Some(1),
            per_page: Some(20),
        },
    )
    .await?;
    assert!(cart.data.unwrap().items.is_empty());

    // Redelivery of the same session must not create a second order or
    // decrement stock again.
    let replay = paid_session_event("cs_test_1", user_id, &items, 19_500);
    order_service::handle_payment_event(&state, replay).await?;
    let count = Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .all(&state.orm)
        .await?
        .len();
    assert_eq!(count, 1);
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product");
    assert_eq!(product.stock, 8);

    Ok(())
}

#[tokio::test]
async fn admin_drives_order_lifecycle() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = Uuid::new_v4();
    let product_id = seed_product(&state, "Lifecycle Candle", 5_000, 5).await?;
    let items = vec![SessionItemSnapshot {
        product_id,
        quantity: 1,
        line_amount_pln: 5_000,
    }];
    let event = paid_session_event("cs_test_2", user_id, &items, 6_500);
    order_service::handle_payment_event(&state, event).await?;

    let order = Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .one(&state.orm)
        .await?
        .expect("order persisted");

    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: "admin".into(),
    };

    // paid -> delivered skips a step and must be rejected.
    let skip = order_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Delivered,
        },
    )
    .await;
    assert!(skip.is_err());

    let accepted = order_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Accepted,
        },
    )
    .await?;
    assert_eq!(accepted.data.unwrap().status, "accepted");

    // Non-admins cannot drive the lifecycle.
    let customer = AuthUser {
        user_id,
        role: "user".into(),
    };
    let forbidden = order_service::update_order_status(
        &state,
        &customer,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Shipped,
        },
    )
    .await;
    assert!(forbidden.is_err());

    Ok(())
}
