use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use bytes::Bytes;
use futures_util::Stream;
use mediarelay_core::{ApiKeyRecord, VideoSummary};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::{json, Value};
use tempfile::TempPath;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

use super::{
    bad_query, clamp_param, error_response, gate, not_configured, required, upstream_error,
    ApiResult,
};
use crate::auth::fingerprint;
use crate::gating::RouteId;
use crate::state::AppState;

pub const MAX_SEARCH_LIMIT: u32 = 10;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/music", gate(state, RouteId::MusicSearch, get(search)))
        .route(
            "/api/music/download",
            gate(state, RouteId::MusicDownload, get(download)),
        )
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub query: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    params: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(params) = params.map_err(bad_query)?;
    let query = required(params.query, "query")?;
    let limit = clamp_param(params.limit, 1, 1, MAX_SEARCH_LIMIT);

    let video = state
        .upstreams
        .video
        .as_ref()
        .ok_or_else(|| not_configured("Video search"))?;

    let mut hits = video
        .search(&query, limit)
        .await
        .map_err(|e| upstream_error("Failed to search video", &e))?;
    if hits.is_empty() {
        return Err(error_response(StatusCode::NOT_FOUND, "Video not found."));
    }

    let data = if limit == 1 {
        json!(hits.swap_remove(0))
    } else {
        json!(hits)
    };
    Ok(Json(json!({
        "message": "Results found.",
        "data": data,
    })))
}

async fn download(
    State(state): State<AppState>,
    caller: Option<Extension<ApiKeyRecord>>,
    params: Result<Query<DownloadQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = params.map_err(bad_query)?;
    let query = required(params.query, "query")?;

    let video_search = state
        .upstreams
        .video
        .as_ref()
        .ok_or_else(|| not_configured("Video search"))?;

    let video = video_search
        .search(&query, 1)
        .await
        .map_err(|e| upstream_error("Failed to search video", &e))?
        .into_iter()
        .next()
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Video not found."))?;

    let audio = transcode_to_temp(&state, &video).await?;

    let file = File::open(&audio).await.map_err(|e| {
        error!("failed to open {}: {e}", audio.display());
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read audio.")
    })?;
    let len = file.metadata().await.map(|m| m.len()).ok();

    match &caller {
        Some(Extension(record)) => info!(
            "streaming {:?} to {} ({})",
            video.title,
            record.name,
            fingerprint(&record.key)
        ),
        None => info!("streaming {:?}", video.title),
    }

    let body = Body::from_stream(TempFileStream {
        inner: ReaderStream::new(file),
        _path: audio,
    });

    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
    if let Some(len) = len {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&video.title)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// Transcode `video` into a fresh temp file under the audio directory. The
/// returned path deletes the file when dropped.
async fn transcode_to_temp(state: &AppState, video: &VideoSummary) -> ApiResult<TempPath> {
    let internal = |what: &str, e: &dyn std::fmt::Display| {
        error!("{what}: {e}");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to download audio. Details: {what}"),
        )
    };

    tokio::fs::create_dir_all(&state.audio_dir)
        .await
        .map_err(|e| internal("create audio directory", &e))?;

    let path = tempfile::Builder::new()
        .prefix("audio-")
        .suffix(".mp3")
        .tempfile_in(&state.audio_dir)
        .map_err(|e| internal("create temp file", &e))?
        .into_temp_path();

    let result = state
        .upstreams
        .transcoder
        .extract_audio(&video.video_url, &path)
        .await;
    if let Err(e) = result {
        drop(path);
        return Err(upstream_error("Failed to download audio", &e));
    }
    Ok(path)
}

/// Streams an audio file and removes it once the body is dropped, whether
/// the transfer completed or the client went away.
struct TempFileStream {
    // Declared first so the handle closes before the path is unlinked.
    inner: ReaderStream<File>,
    _path: TempPath,
}

impl Stream for TempFileStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Replace characters that are illegal in filenames on common platforms.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        "audio".to_string()
    } else {
        cleaned.to_string()
    }
}

fn content_disposition(title: &str) -> String {
    let name = format!("{}.mp3", sanitize_filename(title));
    let ascii: String = name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    if ascii == name {
        format!("attachment; filename=\"{name}\"")
    } else {
        format!(
            "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
            utf8_percent_encode(&name, ATTR_CHAR_ESCAPE)
        )
    }
}

/// RFC 5987 `attr-char`: everything else in an extended value is escaped.
const ATTR_CHAR_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');
