use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use chrono::Utc;

use crate::{
    dto::orders::CarrierStatusUpdate,
    error::{AppError, AppResult},
    models::Order,
    payments::{self, WebhookEvent},
    response::{ApiResponse, Meta},
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payment", post(payment_webhook))
        .route("/shipping", post(shipping_webhook))
}

/// Payment confirmation callback. The raw body is verified against the
/// provider signature before anything is parsed. A persistence failure
/// returns 500 so the provider redelivers; the payment itself is never
/// reversed.
#[utoipa::path(
    post,
    path = "/api/webhooks/payment",
    request_body(
        content = String,
        content_type = "application/json",
        description = "Raw signed event payload"
    ),
    responses(
        (status = 200, description = "Event processed", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid signature or payload"),
    ),
    tag = "Webhooks"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::SignatureInvalid)?;
    payments::verify_signature(
        &state.config.payment_webhook_secret,
        signature,
        &body,
        Utc::now().timestamp(),
    )?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("unreadable webhook payload: {e}")))?;

    order_service::handle_payment_event(&state, event).await?;

    Ok(Json(ApiResponse::success(
        "OK",
        serde_json::json!({}),
        Some(Meta::empty()),
    )))
}

/// Shipping-carrier status relay. Authenticated by a shared token; moves
/// orders along the shipped/delivered transitions.
#[utoipa::path(
    post,
    path = "/api/webhooks/shipping",
    request_body = CarrierStatusUpdate,
    responses(
        (status = 200, description = "Order status updated", body = ApiResponse<Order>),
        (status = 403, description = "Bad carrier token"),
        (status = 404, description = "No order for service id"),
    ),
    tag = "Webhooks"
)]
pub async fn shipping_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CarrierStatusUpdate>,
) -> AppResult<Json<ApiResponse<Order>>> {
    if let Some(expected) = state.config.carrier_webhook_token.as_deref() {
        let provided = headers
            .get("x-carrier-token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if provided != expected {
            return Err(AppError::Forbidden);
        }
    }

    Ok(Json(
        order_service::handle_carrier_event(&state, payload).await?,
    ))
}
