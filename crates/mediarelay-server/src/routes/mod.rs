pub mod chat;
pub mod info;
pub mod keys;
pub mod music;
pub mod photos;
pub mod weather;

use axum::{
    handler::HandlerWithoutStateExt,
    http::StatusCode,
    middleware,
    routing::MethodRouter,
    Json, Router,
};
use mediarelay_upstream::UpstreamError;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::error;

use crate::auth::require_api_key;
use crate::gating::RouteId;
use crate::state::AppState;

pub type ApiError = (StatusCode, Json<Value>);
pub type ApiResult<T> = Result<T, ApiError>;

/// Wrap `method_router` with key verification when the gating table says so.
fn gate(
    state: &AppState,
    route: RouteId,
    method_router: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    if state.gating.is_gated(route) {
        method_router.route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
    } else {
        method_router
    }
}

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .merge(info::routes(&state))
        .merge(keys::routes(&state))
        .merge(music::routes(&state))
        .merge(photos::routes(&state))
        .merge(weather::routes(&state))
        .merge(chat::routes(&state));

    let router = match &state.static_dir {
        Some(dir) => {
            router.fallback_service(ServeDir::new(dir).not_found_service(not_found.into_service()))
        }
        None => router.fallback(not_found),
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn not_found() -> ApiError {
    error_response(StatusCode::NOT_FOUND, "Route not found.")
}

pub(crate) fn error_response(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": msg.into() })))
}

/// Trimmed, non-blank value of a required query parameter.
pub(crate) fn required(value: Option<String>, name: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            error_response(
                StatusCode::BAD_REQUEST,
                format!("Parameter \"{name}\" is required."),
            )
        })
}

pub(crate) fn bad_query(e: impl std::fmt::Display) -> ApiError {
    error_response(StatusCode::BAD_REQUEST, format!("Invalid query: {e}"))
}

pub(crate) fn not_configured(feature: &str) -> ApiError {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        format!("{feature} is not configured"),
    )
}

/// Map a collaborator failure to a response. `context` names what was
/// being attempted.
pub(crate) fn upstream_error(context: &str, e: &UpstreamError) -> ApiError {
    error!("{context}: {e}");
    match e {
        UpstreamError::NotFound(what) => {
            error_response(StatusCode::NOT_FOUND, format!("Not found: {what}"))
        }
        _ => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{context}. Details: {e}"),
        ),
    }
}

/// Clamp an optional numeric parameter into `min..=max`.
pub(crate) fn clamp_param(value: Option<u32>, default: u32, min: u32, max: u32) -> u32 {
    value.unwrap_or(default).clamp(min, max)
}
