use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use mediarelay_core::api_key::generate_token;
use mediarelay_core::{timestamp, ApiKeyRecord, KeyError};
use mediarelay_store::KeyStore;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::state::AppState;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// SHA-256 hash a raw key, returning the hex-encoded digest.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Short, log-safe identifier for a token.
pub fn fingerprint(token: &str) -> String {
    sha256_hex(token)[..12].to_string()
}

fn storage(e: mediarelay_store::StoreError) -> KeyError {
    KeyError::Storage(e.to_string())
}

/// Issue a new key labelled `name`, valid for 30 calendar days from `now`.
///
/// A blank label is rejected before anything is written.
pub async fn issue_key(
    store: &dyn KeyStore,
    name: &str,
    now: DateTime<Utc>,
) -> Result<ApiKeyRecord, KeyError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(KeyError::MissingName);
    }

    let record = ApiKeyRecord::new(name, generate_token(), now);
    store.append(record.clone()).await.map_err(storage)?;

    info!(
        "issued API key {} for {name:?}, expires {}",
        fingerprint(&record.key),
        timestamp::format(&record.expires_at)
    );
    Ok(record)
}

/// Resolve `token` to its record, distinguishing a missing token from an
/// unknown one and an unknown one from an expired one. Never writes.
pub async fn verify_key(
    store: &dyn KeyStore,
    token: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ApiKeyRecord, KeyError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(KeyError::Missing)?;

    let record = store
        .find(token)
        .await
        .map_err(storage)?
        .ok_or(KeyError::Invalid)?;

    if record.is_expired_at(now) {
        return Err(KeyError::Expired);
    }
    Ok(record)
}

/// Read the token from `x-api-key`, falling back to `Authorization: Bearer`.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        })
}

pub fn key_error_status(e: &KeyError) -> StatusCode {
    match e {
        KeyError::MissingName => StatusCode::BAD_REQUEST,
        KeyError::Missing => StatusCode::UNAUTHORIZED,
        KeyError::Invalid | KeyError::Expired => StatusCode::FORBIDDEN,
        KeyError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn key_error_response(e: &KeyError) -> Response {
    (key_error_status(e), Json(json!({ "error": e.to_string() }))).into_response()
}

/// Axum middleware guarding gated routes.
///
/// On success the resolved [`ApiKeyRecord`] is inserted into the request
/// extensions for handlers that want to know who is calling.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = token_from_headers(request.headers()).map(str::to_string);

    match verify_key(state.keys.as_ref(), token.as_deref(), Utc::now()).await {
        Ok(record) => {
            debug!(
                "key {} ({}) accepted for {}",
                fingerprint(&record.key),
                record.name,
                request.uri().path()
            );
            request.extensions_mut().insert(record);
            next.run(request).await
        }
        Err(e) => {
            match &e {
                KeyError::Storage(msg) => error!("key verification failed: {msg}"),
                _ => warn!("rejected request to {}: {e}", request.uri().path()),
            }
            key_error_response(&e)
        }
    }
}
