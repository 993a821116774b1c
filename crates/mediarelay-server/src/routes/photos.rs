use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{bad_query, clamp_param, gate, not_configured, upstream_error, ApiResult};
use crate::gating::RouteId;
use crate::state::AppState;

pub const DEFAULT_QUERY: &str = "nature";
pub const DEFAULT_PER_PAGE: u32 = 15;
pub const MAX_PER_PAGE: u32 = 80;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new().route(
        "/api/photo-search",
        gate(state, RouteId::PhotoSearch, get(search)),
    )
}

#[derive(Debug, Deserialize)]
pub struct PhotoQuery {
    pub query: Option<String>,
    pub per_page: Option<u32>,
}

async fn search(
    State(state): State<AppState>,
    params: Result<Query<PhotoQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(params) = params.map_err(bad_query)?;
    let query = params
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| DEFAULT_QUERY.to_string());
    let per_page = clamp_param(params.per_page, DEFAULT_PER_PAGE, 1, MAX_PER_PAGE);

    let photos = state
        .upstreams
        .photos
        .as_ref()
        .ok_or_else(|| not_configured("Photo search"))?
        .search(&query, per_page)
        .await
        .map_err(|e| upstream_error("Failed to search photos", &e))?;

    Ok(Json(json!({
        "message": "Photos found.",
        "query": query,
        "photos": photos,
    })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use mediarelay_upstream::mock::MockPhotoSearch;
    use tower::ServiceExt;

    use super::*;
    use crate::state::Upstreams;
    use crate::test_helpers::{body_json, mock_upstreams, TestAppBuilder};

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn defaults_to_nature_and_fifteen() {
        let photos = Arc::new(MockPhotoSearch::new());
        let app = TestAppBuilder::new()
            .upstreams(Upstreams {
                photos: Some(photos.clone()),
                ..mock_upstreams()
            })
            .build();

        let resp = app.router.clone().oneshot(get("/api/photo-search")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["query"], "nature");
        assert_eq!(photos.last_query(), Some(("nature".to_string(), 15)));

        let first = &body["photos"][0];
        assert_eq!(first["photographerUrl"], "https://www.pexels.com/@jane");
        assert!(first["src"]["medium"].as_str().unwrap().ends_with("medium.jpg"));
    }

    #[tokio::test]
    async fn per_page_is_clamped() {
        let photos = Arc::new(MockPhotoSearch::new());
        let app = TestAppBuilder::new()
            .upstreams(Upstreams {
                photos: Some(photos.clone()),
                ..mock_upstreams()
            })
            .build();

        let resp = app
            .router
            .clone()
            .oneshot(get("/api/photo-search?query=ocean&per_page=500"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(photos.last_query(), Some(("ocean".to_string(), 80)));
    }

    #[tokio::test]
    async fn non_numeric_per_page_is_400() {
        let app = TestAppBuilder::new().build();
        let resp = app
            .router
            .clone()
            .oneshot(get("/api/photo-search?per_page=lots"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upstream_failure_is_500() {
        let app = TestAppBuilder::new()
            .upstreams(Upstreams {
                photos: Some(Arc::new(MockPhotoSearch::new().with_fail())),
                ..mock_upstreams()
            })
            .build();
        let resp = app.router.clone().oneshot(get("/api/photo-search")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unconfigured_is_503() {
        let app = TestAppBuilder::new()
            .upstreams(Upstreams {
                photos: None,
                ..mock_upstreams()
            })
            .build();
        let resp = app.router.clone().oneshot(get("/api/photo-search")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
