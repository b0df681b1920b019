use std::collections::HashMap;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::checkout::{CheckoutRequest, CheckoutResponse, SessionItemSnapshot},
    entity::products::{Column as ProdCol, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    payments::{self, SessionLine},
    pricing::{self, CartLine, Discount},
    response::{ApiResponse, Meta},
    services::{coupon_service, rate_service},
    state::AppState,
};

/// One checkout submission: price the cart with authoritative unit prices,
/// apply the coupon (soft-failing), and create the payment session. The
/// order itself is only persisted later, by the payment webhook.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    // Reject malformed requests before any side effect; in particular the
    // coupon redemption below must not burn a use on an invalid cart.
    if payload.cart_items.is_empty() {
        return Err(AppError::InvalidCart("cart is empty".into()));
    }
    if payload.shipping_cost_pln < 0 {
        return Err(AppError::InvalidCart("shipping cost cannot be negative".into()));
    }

    let ids: Vec<Uuid> = payload.cart_items.iter().map(|i| i.product_id).collect();
    let products: HashMap<Uuid, ProductModel> = Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut lines = Vec::with_capacity(payload.cart_items.len());
    for item in &payload.cart_items {
        let product = products.get(&item.product_id).ok_or_else(|| {
            AppError::InvalidCart(format!("unknown product {}", item.product_id))
        })?;
        if item.quantity <= 0 {
            return Err(AppError::InvalidCart("quantity must be greater than 0".into()));
        }
        if (product.stock as i64) < item.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for product {}",
                product.id
            )));
        }
        lines.push(CartLine {
            product_id: product.id,
            unit_price_pln: product.price_pln,
            quantity: item.quantity,
        });
    }

    // Optimistic: the redemption counter moves before payment completes.
    let redeemed = match payload.coupon_code.as_deref() {
        Some(code) => coupon_service::resolve_and_redeem(state, code).await?,
        None => None,
    };
    let (coupon_code, discount) = match redeemed {
        Some((code, discount)) => (Some(code), discount),
        None => (None, Discount::None),
    };

    let outcome = pricing::aggregate(&lines, discount, payload.shipping_cost_pln)?;

    // Display bookkeeping only; PLN stays the amount of record.
    let shipping_cost_eur =
        rate_service::pln_to_eur_minor(state, outcome.shipping_cost_pln).await;
    let total_eur = rate_service::pln_to_eur_minor(state, outcome.total_payable).await;

    let snapshots: Vec<SessionItemSnapshot> = outcome
        .lines
        .iter()
        .map(|line| SessionItemSnapshot {
            product_id: line.product_id,
            quantity: line.quantity,
            line_amount_pln: line.discounted_line_amount,
        })
        .collect();
    let items_json = serde_json::to_string(&snapshots)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    let mut metadata: Vec<(String, String)> = vec![
        ("user_id".into(), user.user_id.to_string()),
        ("shipping_address".into(), payload.shipping_address.clone()),
        ("service_id".into(), payload.service_id.clone()),
        ("carrier_name".into(), payload.carrier_name.clone()),
        (
            "shipping_cost_pln".into(),
            outcome.shipping_cost_pln.to_string(),
        ),
        ("shipping_cost_eur".into(), shipping_cost_eur.to_string()),
        ("total_pln".into(), outcome.total_payable.to_string()),
        ("total_eur".into(), total_eur.to_string()),
        ("discount_pln".into(), outcome.discount_amount.to_string()),
        ("items".into(), items_json),
    ];
    if let Some(code) = &coupon_code {
        metadata.push(("coupon_code".into(), code.clone()));
    }

    let mut session_lines: Vec<SessionLine> = Vec::with_capacity(outcome.lines.len() + 1);
    for line in &outcome.lines {
        if line.discounted_line_amount == 0 {
            continue;
        }
        let name = products
            .get(&line.product_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| line.product_id.to_string());
        if line.discounted_line_amount % line.quantity == 0 {
            session_lines.push(SessionLine {
                name,
                unit_amount_pln: line.discounted_line_amount / line.quantity,
                quantity: line.quantity,
            });
        } else {
            // The exact line amount does not divide evenly over the units;
            // charge it as a single session line so the session total still
            // matches the order total.
            session_lines.push(SessionLine {
                name: format!("{name} x{}", line.quantity),
                unit_amount_pln: line.discounted_line_amount,
                quantity: 1,
            });
        }
    }
    if outcome.shipping_cost_pln > 0 {
        session_lines.push(SessionLine {
            name: format!("Shipping ({})", payload.carrier_name),
            unit_amount_pln: outcome.shipping_cost_pln,
            quantity: 1,
        });
    }

    let url =
        payments::create_checkout_session(&state.http, &state.config, &session_lines, &metadata)
            .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout_session_created",
        Some("orders"),
        Some(serde_json::json!({
            "total_pln": outcome.total_payable,
            "discount_pln": outcome.discount_amount,
            "coupon_code": coupon_code,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Checkout session created",
        CheckoutResponse { url },
        Some(Meta::empty()),
    ))
}
