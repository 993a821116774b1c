use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use mediarelay_core::{timestamp, KeyError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use super::{error_response, gate, ApiResult};
use crate::auth::{issue_key, key_error_status};
use crate::gating::RouteId;
use crate::state::AppState;

const KEY_PAGE: &str = "generate-api-key.html";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/generate-api-key",
            gate(state, RouteId::KeyPage, get(key_page))
                .merge(gate(state, RouteId::GenerateKey, post(generate_key))),
        )
        // Shadows the static fallback so the page follows the same gate.
        .route(
            &format!("/{KEY_PAGE}"),
            gate(state, RouteId::KeyPage, get(key_page)),
        )
}

#[derive(Debug, Deserialize)]
pub struct GenerateKeyRequest {
    #[serde(rename = "apiName")]
    pub api_name: Option<String>,
}

async fn key_page(State(state): State<AppState>) -> ApiResult<Html<String>> {
    let Some(dir) = &state.static_dir else {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            "Key generation page is not available.",
        ));
    };
    let path = dir.join(KEY_PAGE);
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            warn!("failed to read {}: {e}", path.display());
            Err(error_response(
                StatusCode::NOT_FOUND,
                "Key generation page is not available.",
            ))
        }
    }
}

async fn generate_key(
    State(state): State<AppState>,
    body: Result<Json<GenerateKeyRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = body.map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid request body: {}", e.body_text()),
        )
    })?;
    let name = req.api_name.unwrap_or_default();

    let now = timestamp::now_millis();
    let record = issue_key(state.keys.as_ref(), &name, now)
        .await
        .map_err(|e| {
            if let KeyError::Storage(msg) = &e {
                error!("failed to persist API key: {msg}");
            }
            error_response(key_error_status(&e), e.to_string())
        })?;

    Ok(Json(json!({
        "message": "API key generated successfully.",
        "apiKey": record.key,
        "expirationDate": timestamp::format(&record.expires_at),
    })))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Request};
    use chrono::{DateTime, Days, Utc};
    use mediarelay_store::KeyStore;
    use tower::ServiceExt;

    use super::*;
    use crate::gating::GatingTable;
    use crate::test_helpers::{body_json, TestAppBuilder};

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/generate-api-key")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn generate_returns_key_and_thirty_day_expiry() {
        let app = TestAppBuilder::new().build();
        let before = Utc::now();

        let resp = app
            .router
            .clone()
            .oneshot(post_json(r#"{"apiName":"TestApp"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["message"], "API key generated successfully.");

        let key = body["apiKey"].as_str().unwrap();
        assert!(key.starts_with("mr_"));

        let expiry = DateTime::parse_from_rfc3339(body["expirationDate"].as_str().unwrap())
            .unwrap()
            .with_timezone(&Utc);
        let lower = before.checked_add_days(Days::new(30)).unwrap() - chrono::Duration::seconds(1);
        let upper = Utc::now().checked_add_days(Days::new(30)).unwrap();
        assert!(expiry >= lower && expiry <= upper, "expiry {expiry} out of range");

        let stored = app.store.find(key).await.unwrap().unwrap();
        assert_eq!(stored.name, "TestApp");
    }

    #[tokio::test]
    async fn generate_without_name_is_400_and_stores_nothing() {
        let app = TestAppBuilder::new().build();

        for body in [r#"{}"#, r#"{"apiName":""}"#, r#"{"apiName":"   "}"#] {
            let resp = app.router.clone().oneshot(post_json(body)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
            assert_eq!(
                body_json(resp).await["error"],
                "Parameter \"apiName\" is required."
            );
        }
        assert_eq!(app.store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn generate_with_malformed_json_is_400() {
        let app = TestAppBuilder::new().build();
        let resp = app.router.clone().oneshot(post_json("{not json")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn key_page_served_from_static_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(KEY_PAGE), "<h1>Get a key</h1>").unwrap();
        let app = TestAppBuilder::new().static_dir(tmp.path()).build();

        let resp = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/generate-api-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>Get a key</h1>");
    }

    #[tokio::test]
    async fn gated_key_page_is_not_reachable_through_static_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(KEY_PAGE), "<h1>Get a key</h1>").unwrap();
        let app = TestAppBuilder::new()
            .gating(GatingTable::parse_list("key-page").unwrap())
            .static_dir(tmp.path())
            .build();

        for uri in ["/api/generate-api-key", "/generate-api-key.html"] {
            let resp = app
                .router
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }

        let key = app.issue_key("admin").await;
        let resp = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/generate-api-key.html")
                    .header(crate::auth::API_KEY_HEADER, key)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn key_page_missing_is_404() {
        let app = TestAppBuilder::new().build();
        let resp = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/generate-api-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
