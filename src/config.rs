use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    /// Payment provider (Stripe-compatible checkout sessions).
    pub payment_api_base: String,
    pub payment_secret_key: String,
    pub payment_webhook_secret: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,

    /// Exchange-rate provider proxy and geo-IP lookup.
    pub rate_api_base: String,
    pub geo_api_base: String,

    /// Transactional email; unset means notifications are skipped.
    pub email_api_url: Option<String>,
    pub email_api_key: Option<String>,
    pub email_from: String,
    pub admin_alert_email: Option<String>,

    /// Shared secret expected from the shipping carrier relay.
    pub carrier_webhook_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        Ok(Self {
            database_url,
            host,
            port,
            payment_api_base: env::var("PAYMENT_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            payment_secret_key: env::var("PAYMENT_SECRET_KEY")?,
            payment_webhook_secret: env::var("PAYMENT_WEBHOOK_SECRET")?,
            checkout_success_url: env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:5173/checkout/success".to_string()),
            checkout_cancel_url: env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or_else(|_| "http://localhost:5173/checkout/cancel".to_string()),
            rate_api_base: env::var("RATE_API_BASE")
                .unwrap_or_else(|_| "https://api.exchangerate.host".to_string()),
            geo_api_base: env::var("GEO_API_BASE")
                .unwrap_or_else(|_| "https://ipapi.co".to_string()),
            email_api_url: env::var("EMAIL_API_URL").ok(),
            email_api_key: env::var("EMAIL_API_KEY").ok(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "orders@candleshop.example".to_string()),
            admin_alert_email: env::var("ADMIN_ALERT_EMAIL").ok(),
            carrier_webhook_token: env::var("CARRIER_WEBHOOK_TOKEN").ok(),
        })
    }
}
