//! Narrow client for the hosted-checkout payment provider.
//!
//! Only two contracts exist: creating a checkout session (form POST, returns
//! a redirect URL) and verifying the signed webhook events it sends back.
//! Everything else about the provider is opaque.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
};

type HmacSha256 = Hmac<Sha256>;

/// Signed-webhook timestamp tolerance, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// One line item of a payment session, already discounted.
#[derive(Debug, Clone)]
pub struct SessionLine {
    pub name: String,
    pub unit_amount_pln: i64,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
struct SessionCreated {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: Option<ProviderErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: Option<String>,
}

/// Create a hosted checkout session and return the redirect URL.
pub async fn create_checkout_session(
    http: &reqwest::Client,
    config: &AppConfig,
    lines: &[SessionLine],
    metadata: &[(String, String)],
) -> AppResult<String> {
    let mut form: Vec<(String, String)> = vec![
        ("mode".into(), "payment".into()),
        ("success_url".into(), config.checkout_success_url.clone()),
        ("cancel_url".into(), config.checkout_cancel_url.clone()),
    ];
    for (i, line) in lines.iter().enumerate() {
        form.push((
            format!("line_items[{i}][price_data][currency]"),
            "pln".into(),
        ));
        form.push((
            format!("line_items[{i}][price_data][product_data][name]"),
            line.name.clone(),
        ));
        form.push((
            format!("line_items[{i}][price_data][unit_amount]"),
            line.unit_amount_pln.to_string(),
        ));
        form.push((format!("line_items[{i}][quantity]"), line.quantity.to_string()));
    }
    for (key, value) in metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }

    let response = http
        .post(format!("{}/v1/checkout/sessions", config.payment_api_base))
        .bearer_auth(&config.payment_secret_key)
        .form(&form)
        .send()
        .await
        .map_err(|e| AppError::PaymentProvider(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let message = response
            .json::<ProviderError>()
            .await
            .ok()
            .and_then(|e| e.error.and_then(|b| b.message))
            .unwrap_or_else(|| format!("session creation failed with status {status}"));
        return Err(AppError::PaymentProvider(message));
    }

    let created: SessionCreated = response
        .json()
        .await
        .map_err(|e| AppError::PaymentProvider(e.to_string()))?;
    created
        .url
        .ok_or_else(|| AppError::PaymentProvider("session response had no url".into()))
}

/// Webhook event envelope. Only `checkout.session.completed` is acted on.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: CheckoutSession,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    pub amount_total: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

/// Build the signature header value for `payload` at `timestamp`:
/// `t=<ts>,v1=<hex hmac-sha256 of "<ts>.<payload>">`.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let digest = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={digest}"))
}

/// Verify a signed webhook. Rejects malformed headers, signatures outside
/// the tolerance window, and digest mismatches.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
) -> AppResult<()> {
    let mut timestamp: Option<i64> = None;
    let mut digests: Vec<String> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => digests.push(value.to_string()),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(AppError::SignatureInvalid)?;
    if digests.is_empty() || (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(AppError::SignatureInvalid);
    }

    for digest in digests {
        let Ok(expected) = hex::decode(&digest) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }
    Err(AppError::SignatureInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const PAYLOAD: &[u8] = br#"{"type":"checkout.session.completed"}"#;

    #[test]
    fn valid_signature_passes() {
        let header = sign_payload(SECRET, 1_700_000_000, PAYLOAD).unwrap();
        assert!(verify_signature(SECRET, &header, PAYLOAD, 1_700_000_000).is_ok());
    }

    #[test]
    fn tampered_payload_fails() {
        let header = sign_payload(SECRET, 1_700_000_000, PAYLOAD).unwrap();
        assert!(verify_signature(SECRET, &header, b"{}", 1_700_000_000).is_err());
    }

    #[test]
    fn wrong_secret_fails() {
        let header = sign_payload("whsec_other", 1_700_000_000, PAYLOAD).unwrap();
        assert!(verify_signature(SECRET, &header, PAYLOAD, 1_700_000_000).is_err());
    }

    #[test]
    fn stale_timestamp_fails() {
        let header = sign_payload(SECRET, 1_700_000_000, PAYLOAD).unwrap();
        let later = 1_700_000_000 + SIGNATURE_TOLERANCE_SECS + 1;
        assert!(verify_signature(SECRET, &header, PAYLOAD, later).is_err());
    }

    #[test]
    fn malformed_header_fails() {
        assert!(verify_signature(SECRET, "v1=deadbeef", PAYLOAD, 0).is_err());
        assert!(verify_signature(SECRET, "t=123", PAYLOAD, 123).is_err());
        assert!(verify_signature(SECRET, "", PAYLOAD, 0).is_err());
    }

    #[test]
    fn event_parses() {
        let raw = serde_json::json!({
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "metadata": { "user_id": "abc" },
                "customer_details": { "email": "a@b.pl" },
                "amount_total": 19500
            }}
        });
        let event: WebhookEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.data.object.amount_total, Some(19_500));
        assert_eq!(
            event.data.object.metadata.get("user_id").map(String::as_str),
            Some("abc")
        );
    }
}
