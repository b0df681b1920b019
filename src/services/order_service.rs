use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::{
        checkout::SessionItemSnapshot,
        orders::{CarrierStatusUpdate, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem, OrderStatus},
    notify,
    payments::WebhookEvent,
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    state::AppState,
};

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    list_with_condition(
        state,
        query,
        Condition::all().add(OrderCol::UserId.eq(user.user_id)),
    )
    .await
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    list_with_condition(state, query, Condition::all()).await
}

async fn list_with_condition(
    state: &AppState,
    query: OrderListQuery,
    mut condition: Condition,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let finder = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt);
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
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let mut condition = Condition::all().add(OrderCol::Id.eq(id));
    if user.role != "admin" {
        condition = condition.add(OrderCol::UserId.eq(user.user_id));
    }
    let order = Orders::find().filter(condition).one(&state.orm).await?;
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

/// Values the checkout wrote into the session metadata.
#[derive(Debug)]
struct SessionMeta {
    user_id: Uuid,
    shipping_address: String,
    service_id: String,
    carrier_name: String,
    shipping_cost_pln: i64,
    shipping_cost_eur: i64,
    total_pln: i64,
    total_eur: i64,
    discount_pln: i64,
    coupon_code: Option<String>,
    items: Vec<SessionItemSnapshot>,
}

fn meta_str(meta: &HashMap<String, String>, key: &str) -> AppResult<String> {
    meta.get(key)
        .cloned()
        .ok_or_else(|| AppError::BadRequest(format!("webhook metadata missing {key}")))
}

fn meta_i64(meta: &HashMap<String, String>, key: &str) -> AppResult<i64> {
    meta_str(meta, key)?
        .parse()
        .map_err(|_| AppError::BadRequest(format!("webhook metadata {key} is not a number")))
}

fn parse_metadata(meta: &HashMap<String, String>) -> AppResult<SessionMeta> {
    let user_id = Uuid::parse_str(&meta_str(meta, "user_id")?)
        .map_err(|_| AppError::BadRequest("webhook metadata user_id is not a uuid".into()))?;
    let items: Vec<SessionItemSnapshot> = serde_json::from_str(&meta_str(meta, "items")?)
        .map_err(|_| AppError::BadRequest("webhook metadata items unreadable".into()))?;
    Ok(SessionMeta {
        user_id,
        shipping_address: meta_str(meta, "shipping_address")?,
        service_id: meta_str(meta, "service_id")?,
        carrier_name: meta_str(meta, "carrier_name")?,
        shipping_cost_pln: meta_i64(meta, "shipping_cost_pln")?,
        shipping_cost_eur: meta_i64(meta, "shipping_cost_eur")?,
        total_pln: meta_i64(meta, "total_pln")?,
        total_eur: meta_i64(meta, "total_eur")?,
        discount_pln: meta_i64(meta, "discount_pln")?,
        coupon_code: meta.get("coupon_code").cloned(),
        items,
    })
}

/// Payment confirmation. On `checkout.session.completed` the order and its
/// items are persisted, stock decremented and the cart cleared in one
/// transaction; notifications afterwards are best-effort. Redelivered
/// events are recognized by the session id and ignored.
pub async fn handle_payment_event(state: &AppState, event: WebhookEvent) -> AppResult<()> {
    if event.event_type != "checkout.session.completed" {
        tracing::debug!(event_type = %event.event_type, "ignoring payment event");
        return Ok(());
    }

    let session = event.data.object;
    let meta = parse_metadata(&session.metadata)?;

    let existing = Orders::find()
        .filter(OrderCol::PaymentSessionId.eq(session.id.clone()))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        tracing::info!(session_id = %session.id, "order already persisted, skipping redelivery");
        return Ok(());
    }

    let txn = state.orm.begin().await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(meta.user_id),
        payment_session_id: Set(session.id.clone()),
        total_pln: Set(meta.total_pln),
        total_eur: Set(meta.total_eur),
        shipping_cost_pln: Set(meta.shipping_cost_pln),
        shipping_cost_eur: Set(meta.shipping_cost_eur),
        discount_pln: Set(meta.discount_pln),
        coupon_code: Set(meta.coupon_code.clone()),
        status: Set(OrderStatus::Paid.as_str().into()),
        shipping_address: Set(meta.shipping_address.clone()),
        service_id: Set(meta.service_id.clone()),
        carrier_name: Set(meta.carrier_name.clone()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::new();
    for item in &meta.items {
        let inserted = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity as i32),
            amount_pln: Set(item.line_amount_pln),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        order_items.push(order_item_from_entity(inserted));

        Products::update_many()
            .col_expr(
                ProdCol::Stock,
                Expr::col(ProdCol::Stock).sub(item.quantity as i32),
            )
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(&txn)
            .await?;
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(meta.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    let order = order_from_entity(order);

    if let Some(email) = session.customer_details.and_then(|d| d.email) {
        if let Err(err) = notify::send_order_confirmation(state, &email, &order, &order_items).await
        {
            tracing::warn!(error = %err, order_id = %order.id, "order confirmation email failed");
        }
    } else {
        tracing::debug!(order_id = %order.id, "no customer email on session, skipping confirmation");
    }
    if let Err(err) = notify::send_admin_alert(state, &order).await {
        tracing::warn!(error = %err, order_id = %order.id, "admin alert failed");
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(order.user_id),
        "order_created",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total_pln": order.total_pln })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(())
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let order = transition_order(state, id, payload.status, Some(user.user_id)).await?;
    Ok(ApiResponse::success("Order updated", order, Some(Meta::empty())))
}

/// Carrier relay: match on the service id recorded at checkout and move the
/// order along the shipped/delivered leg of the lifecycle.
pub async fn handle_carrier_event(
    state: &AppState,
    payload: CarrierStatusUpdate,
) -> AppResult<ApiResponse<Order>> {
    if !matches!(payload.status, OrderStatus::Shipped | OrderStatus::Delivered) {
        return Err(AppError::BadRequest(
            "carrier can only report shipped or delivered".into(),
        ));
    }

    let order = Orders::find()
        .filter(OrderCol::ServiceId.eq(payload.service_id.clone()))
        .order_by_desc(OrderCol::CreatedAt)
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if let Some(tracking) = payload.tracking_number.as_deref() {
        tracing::info!(order_id = %order.id, tracking, "carrier reported tracking number");
    }

    let updated = transition_order(state, order.id, payload.status, None).await?;
    Ok(ApiResponse::success(
        "Order status updated",
        updated,
        Some(Meta::empty()),
    ))
}

async fn transition_order(
    state: &AppState,
    id: Uuid,
    next: OrderStatus,
    actor: Option<Uuid>,
) -> AppResult<Order> {
    let existing = Orders::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = OrderStatus::parse(&existing.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order {id} has corrupt status")))?;
    if !current.can_transition(next) {
        return Err(AppError::BadRequest(format!(
            "cannot transition order from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(next.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        actor,
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(order_from_entity(order))
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        payment_session_id: model.payment_session_id,
        total_pln: model.total_pln,
        total_eur: model.total_eur,
        shipping_cost_pln: model.shipping_cost_pln,
        shipping_cost_eur: model.shipping_cost_eur,
        discount_pln: model.discount_pln,
        coupon_code: model.coupon_code,
        status: model.status,
        shipping_address: model.shipping_address,
        service_id: model.service_id,
        carrier_name: model.carrier_name,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        amount_pln: model.amount_pln,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
