use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RateQuery {
    /// Target currency code, e.g. "EUR".
    pub target: String,
}

/// PLN -> target rate. `rate` is null when no rate could be obtained;
/// it is never 1 as a stand-in for "unknown".
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RateResponse {
    pub base: String,
    pub target: String,
    pub rate: Option<f64>,
}
