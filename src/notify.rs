//! Best-effort transactional email. Failures are logged by call sites and
//! never fail the request that triggered them.

use serde_json::json;

use crate::{
    currency::{Currency, format_minor},
    models::{Order, OrderItem},
    state::AppState,
};

/// Customer-facing order confirmation. Amounts of record are PLN; the EUR
/// line is the display bookkeeping copy stored on the order.
pub async fn send_order_confirmation(
    state: &AppState,
    to: &str,
    order: &Order,
    items: &[OrderItem],
) -> anyhow::Result<()> {
    let mut rows = String::new();
    for item in items {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            item.product_id,
            item.quantity,
            format_minor(Currency::Pln, item.amount_pln),
        ));
    }
    let html = format!(
        "<h1>Thank you for your order</h1>\
         <p>Order <strong>{id}</strong> is paid.</p>\
         <table>{rows}</table>\
         <p>Shipping ({carrier}): {shipping}</p>\
         <p>Total: {total_pln} (≈ {total_eur})</p>",
        id = order.id,
        carrier = order.carrier_name,
        shipping = format_minor(Currency::Pln, order.shipping_cost_pln),
        total_pln = format_minor(Currency::Pln, order.total_pln),
        total_eur = format_minor(Currency::Eur, order.total_eur),
    );

    send_email(state, to, &format!("Order confirmation {}", order.id), &html).await
}

/// Heads-up to the shop owner about a new paid order.
pub async fn send_admin_alert(state: &AppState, order: &Order) -> anyhow::Result<()> {
    let Some(to) = state.config.admin_alert_email.as_deref() else {
        tracing::debug!("no admin alert email configured, skipping");
        return Ok(());
    };
    let html = format!(
        "<p>New paid order {} for {} (discount {}, coupon {:?}).</p>",
        order.id,
        format_minor(Currency::Pln, order.total_pln),
        format_minor(Currency::Pln, order.discount_pln),
        order.coupon_code,
    );
    send_email(state, to, "New order", &html).await
}

async fn send_email(state: &AppState, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
    let Some(url) = state.config.email_api_url.as_deref() else {
        tracing::debug!(to, subject, "email provider not configured, skipping");
        return Ok(());
    };

    let mut request = state.http.post(url).json(&json!({
        "from": state.config.email_from,
        "to": to,
        "subject": subject,
        "html": html,
    }));
    if let Some(key) = state.config.email_api_key.as_deref() {
        request = request.bearer_auth(key);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        anyhow::bail!("email provider returned {}", response.status());
    }
    Ok(())
}
