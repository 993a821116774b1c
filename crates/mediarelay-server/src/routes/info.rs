use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use super::gate;
use crate::gating::RouteId;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new().route("/api", gate(state, RouteId::Info, get(describe)))
}

struct Param {
    name: &'static str,
    required: bool,
    description: &'static str,
}

fn route_description(route: RouteId) -> (&'static str, Vec<Param>) {
    match route {
        RouteId::Info => ("Describes this service and its endpoints.", vec![]),
        RouteId::KeyPage => ("HTML page for requesting an API key.", vec![]),
        RouteId::GenerateKey => (
            "Issues a new API key valid for 30 days.",
            vec![Param {
                name: "apiName",
                required: true,
                description: "Label for the key (JSON body).",
            }],
        ),
        RouteId::MusicSearch => (
            "Searches YouTube for a song or video.",
            vec![
                Param {
                    name: "query",
                    required: true,
                    description: "Song or video name.",
                },
                Param {
                    name: "limit",
                    required: false,
                    description: "Number of results, 1-10 (default 1).",
                },
            ],
        ),
        RouteId::MusicDownload => (
            "Downloads the audio of the best-matching video as MP3.",
            vec![Param {
                name: "query",
                required: true,
                description: "Song or video name.",
            }],
        ),
        RouteId::PhotoSearch => (
            "Searches stock photos.",
            vec![
                Param {
                    name: "query",
                    required: false,
                    description: "Search term (default \"nature\").",
                },
                Param {
                    name: "per_page",
                    required: false,
                    description: "Results per page, 1-80 (default 15).",
                },
            ],
        ),
        RouteId::Weather => (
            "Weather forecast for a city in 3-hour steps.",
            vec![
                Param {
                    name: "city",
                    required: true,
                    description: "City name.",
                },
                Param {
                    name: "units",
                    required: false,
                    description: "metric, imperial or standard (default metric).",
                },
                Param {
                    name: "days",
                    required: false,
                    description: "Forecast horizon in days, 1-5 (default 5).",
                },
            ],
        ),
        RouteId::Chat => (
            "Chat with Tina, the conversational assistant.",
            vec![
                Param {
                    name: "query",
                    required: true,
                    description: "Message to send.",
                },
                Param {
                    name: "context",
                    required: false,
                    description: "Prior conversation context.",
                },
                Param {
                    name: "user",
                    required: false,
                    description: "Conversation id to keep replies consistent.",
                },
            ],
        ),
    }
}

fn endpoint_catalog(state: &AppState) -> Vec<Value> {
    RouteId::ALL
        .into_iter()
        .map(|route| {
            let (description, params) = route_description(route);
            let parameters: Vec<Value> = params
                .iter()
                .map(|p| {
                    json!({
                        "name": p.name,
                        "type": "string",
                        "required": p.required,
                        "description": p.description,
                    })
                })
                .collect();
            json!({
                "id": route.as_str(),
                "path": route.path(),
                "method": route.method(),
                "description": description,
                "requiresApiKey": state.gating.is_gated(route),
                "parameters": parameters,
            })
        })
        .collect()
}

async fn describe(State(state): State<AppState>) -> Json<Value> {
    let service = &state.service;
    Json(json!({
        "name": service.name,
        "version": service.version,
        "development_day": service.development_day,
        "description": "Relay for YouTube search and audio download, stock photos, weather forecasts and chat.",
        "author": service.author,
        "autor": service.author,
        "owner": service.owner,
        "dono": service.owner,
        "info": service.info,
        "authentication": {
            "header": crate::auth::API_KEY_HEADER,
            "obtain": "POST /api/generate-api-key with {\"apiName\": \"...\"}",
            "validity_days": mediarelay_core::api_key::KEY_LIFETIME_DAYS,
        },
        "endpoints": endpoint_catalog(&state),
        "contact": {
            "email": "suporte@eliobrostech.com",
            "website": "https://eliobrostech.com"
        },
        "faq": [
            {
                "question": "How do I get an API key?",
                "answer": "Send a POST request to /api/generate-api-key with {\"apiName\": \"...\"}, or open the same path in a browser.",
            },
            {
                "question": "How long is a key valid?",
                "answer": format!(
                    "{} days from issuance. Generate a new key once it expires.",
                    mediarelay_core::api_key::KEY_LIFETIME_DAYS
                ),
            },
            {
                "question": "How do I send the key?",
                "answer": format!(
                    "In the {} header, or as Authorization: Bearer <key>.",
                    crate::auth::API_KEY_HEADER
                ),
            },
        ],
    }))
}
