use axum::{
    Json, Router,
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    currency::Currency,
    dto::rates::{RateQuery, RateResponse},
    error::AppResult,
    response::ApiResponse,
    services::rate_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_rate))
        .route("/country", get(get_country))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CountryGuess {
    pub country: Option<String>,
}

/// PLN -> target display rate. An unknown or unavailable rate is reported
/// as `rate: null`, never as 1: the client falls back to its static table.
#[utoipa::path(
    get,
    path = "/api/rates",
    params(("target" = String, Query, description = "Target currency code, e.g. EUR")),
    responses(
        (status = 200, description = "Display conversion rate", body = ApiResponse<RateResponse>)
    ),
    tag = "Rates"
)]
pub async fn get_rate(
    State(state): State<AppState>,
    Query(query): Query<RateQuery>,
) -> AppResult<Json<ApiResponse<RateResponse>>> {
    let target = query.target.trim().to_ascii_uppercase();
    let rate = match Currency::from_code(&target) {
        Some(currency) => rate_service::rate_for(&state, currency).await.rate(),
        None => {
            tracing::debug!(currency = %target, "rate requested for unsupported currency");
            None
        }
    };

    let data = RateResponse {
        base: "PLN".into(),
        target,
        rate,
    };
    Ok(Json(ApiResponse::success("Rate", data, None)))
}

/// Country guess for the calling client, used by the display layer to pick
/// an initial currency. `null` means detection failed; the client defaults
/// to Poland.
#[utoipa::path(
    get,
    path = "/api/rates/country",
    responses(
        (status = 200, description = "Country guess", body = ApiResponse<CountryGuess>)
    ),
    tag = "Rates"
)]
pub async fn get_country(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ApiResponse<CountryGuess>>> {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let country = rate_service::detect_country(&state, ip).await;
    Ok(Json(ApiResponse::success(
        "Country",
        CountryGuess { country },
        None,
    )))
}
