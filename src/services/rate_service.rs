//! Exchange-rate and geo-IP lookups. Both degrade to fallbacks and never
//! surface an error to the caller: a missing rate becomes a `Fallback` or
//! `Unknown` quote, a failed country lookup becomes `None` (Poland at the
//! display layer).

use serde::Deserialize;

use crate::{
    currency::{Currency, FallbackReason, RateQuote},
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct RateProviderResponse {
    rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    country: Option<String>,
}

/// Current PLN -> `currency` quote. Live quotes are cached for an hour;
/// fallbacks are not cached so the provider is retried on the next call.
pub async fn rate_for(state: &AppState, currency: Currency) -> RateQuote {
    if currency == Currency::Pln {
        return RateQuote::Live(1.0);
    }
    if let Some(cached) = state.rates.get(&currency).await {
        return cached;
    }
    let quote = fetch_rate(state, currency).await;
    if matches!(quote, RateQuote::Live(_)) {
        state.rates.put(currency, quote).await;
    }
    quote
}

async fn fetch_rate(state: &AppState, currency: Currency) -> RateQuote {
    let url = format!(
        "{}/rates?base=PLN&target={}",
        state.config.rate_api_base,
        currency.code()
    );
    let response = match state.http.get(&url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::warn!(currency = currency.code(), status = %response.status(), "rate provider rejected request");
            return RateQuote::Fallback(currency.fallback_rate(), FallbackReason::FetchFailed);
        }
        Err(err) => {
            tracing::warn!(currency = currency.code(), error = %err, "rate fetch failed");
            return RateQuote::Fallback(currency.fallback_rate(), FallbackReason::FetchFailed);
        }
    };

    match response.json::<RateProviderResponse>().await {
        Ok(RateProviderResponse { rate: Some(rate) }) if rate.is_finite() && rate > 0.0 => {
            RateQuote::Live(rate)
        }
        Ok(_) => {
            tracing::warn!(currency = currency.code(), "rate provider returned no usable rate");
            RateQuote::Fallback(currency.fallback_rate(), FallbackReason::BadPayload)
        }
        Err(err) => {
            tracing::warn!(currency = currency.code(), error = %err, "rate payload unreadable");
            RateQuote::Fallback(currency.fallback_rate(), FallbackReason::BadPayload)
        }
    }
}

/// Convert PLN minor units to EUR minor units for display bookkeeping.
/// Never used for the amount charged.
pub async fn pln_to_eur_minor(state: &AppState, pln_minor: i64) -> i64 {
    let rate = rate_for(state, Currency::Eur)
        .await
        .display_rate(Currency::Eur);
    (pln_minor as f64 * rate).round() as i64
}

/// Country guess for a client IP, cached for 24 hours. `None` means the
/// lookup failed; the display layer then defaults to Poland.
pub async fn detect_country(state: &AppState, ip: Option<&str>) -> Option<String> {
    let key = ip.unwrap_or("self").to_string();
    if let Some(cached) = state.countries.get(&key).await {
        return cached;
    }
    let guess = fetch_country(state, ip).await;
    state.countries.put(key, guess.clone()).await;
    guess
}

async fn fetch_country(state: &AppState, ip: Option<&str>) -> Option<String> {
    let url = match ip {
        Some(ip) => format!("{}/{}/json", state.config.geo_api_base, ip),
        None => format!("{}/json", state.config.geo_api_base),
    };
    let response = match state.http.get(&url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::warn!(status = %response.status(), "geo lookup rejected");
            return None;
        }
        Err(err) => {
            tracing::warn!(error = %err, "geo lookup failed");
            return None;
        }
    };
    match response.json::<GeoResponse>().await {
        Ok(geo) => geo.country.filter(|c| !c.is_empty()),
        Err(err) => {
            tracing::warn!(error = %err, "geo payload unreadable");
            None
        }
    }
}
