use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use mediarelay_upstream::ChatRequest;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{bad_query, gate, not_configured, required, upstream_error, ApiResult};
use crate::gating::RouteId;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new().route("/api/tina/messages", gate(state, RouteId::Chat, get(message)))
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub query: Option<String>,
    pub context: Option<String>,
    pub user: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn message(
    State(state): State<AppState>,
    params: Result<Query<ChatQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(params) = params.map_err(bad_query)?;
    let query = required(params.query, "query")?;
    let conversation_id = non_blank(params.user).unwrap_or_else(|| Uuid::new_v4().to_string());

    let chat = state
        .upstreams
        .chat
        .as_ref()
        .ok_or_else(|| not_configured("Chat"))?;

    let request = ChatRequest {
        message: query.clone(),
        context: non_blank(params.context),
        user: Some(conversation_id.clone()),
    };
    let reply = chat
        .reply(&request)
        .await
        .map_err(|e| upstream_error("Failed to get a reply from Tina", &e))?;

    Ok(Json(json!({
        "message": "Reply generated.",
        "query": query,
        "reply": reply.reply,
        "model": reply.model,
        "conversationId": conversation_id,
    })))
}
