use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use mediarelay_upstream::weather::MAX_DAYS;
use mediarelay_upstream::Units;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    bad_query, clamp_param, error_response, gate, not_configured, required, upstream_error,
    ApiResult,
};
use crate::gating::RouteId;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new().route("/api/weather", gate(state, RouteId::Weather, get(forecast)))
}

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub city: Option<String>,
    pub units: Option<String>,
    pub days: Option<u32>,
}

async fn forecast(
    State(state): State<AppState>,
    params: Result<Query<WeatherQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(params) = params.map_err(bad_query)?;
    let city = required(params.city, "city")?;
    let units = match params.units.as_deref().map(str::trim) {
        None | Some("") => Units::Metric,
        Some(raw) => Units::parse_str(raw).ok_or_else(|| {
            error_response(
                StatusCode::BAD_REQUEST,
                "Parameter \"units\" must be one of metric, imperial, standard.",
            )
        })?,
    };
    let days = clamp_param(params.days, MAX_DAYS, 1, MAX_DAYS);

    let report = state
        .upstreams
        .weather
        .as_ref()
        .ok_or_else(|| not_configured("Weather"))?
        .forecast(&city, units, days)
        .await
        .map_err(|e| upstream_error("Failed to fetch weather forecast", &e))?;

    Ok(Json(json!({
        "message": "Forecast retrieved.",
        "city": report.city,
        "units": units.as_str(),
        "forecast": report.entries,
        "raw": report.raw,
    })))
}
