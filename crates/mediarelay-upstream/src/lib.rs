pub mod chat;
pub mod mock;
pub mod pexels;
pub mod transcode;
pub mod weather;
pub mod youtube;

pub use chat::OpenAiChatClient;
pub use pexels::PexelsClient;
pub use transcode::FfmpegTranscoder;
pub use weather::{OpenWeatherClient, Units, WeatherReport};
pub use youtube::YouTubeClient;

use std::path::Path;

use async_trait::async_trait;
use mediarelay_core::{ChatReply, Photo, VideoSummary};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("transcode failed: {0}")]
    Transcode(String),
}

/// Free-text video lookup.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    /// Return up to `limit` videos matching `query`, best match first.
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<VideoSummary>, UpstreamError>;
}

/// Turns a video URL into an encoded audio file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write the audio track of `video_url` as MP3 to `dest`.
    ///
    /// On error `dest` may hold a partial file; the caller owns its removal.
    async fn extract_audio(&self, video_url: &str, dest: &Path) -> Result<(), UpstreamError>;
}

#[async_trait]
pub trait PhotoSearch: Send + Sync {
    async fn search(&self, query: &str, per_page: u32) -> Result<Vec<Photo>, UpstreamError>;
}

#[async_trait]
pub trait WeatherForecast: Send + Sync {
    /// Forecast for `city` over `days` days at the provider's native step.
    async fn forecast(
        &self,
        city: &str,
        units: Units,
        days: u32,
    ) -> Result<WeatherReport, UpstreamError>;
}

/// A single chat turn plus optional prior context.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: String,
    pub context: Option<String>,
    pub user: Option<String>,
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn reply(&self, request: &ChatRequest) -> Result<ChatReply, UpstreamError>;
}

// -- Shared HTTP helpers --

const MAX_ERROR_BODY: usize = 300;

/// Map a transport error, dropping the URL: query strings carry API keys.
pub(crate) fn request_error(e: reqwest::Error) -> UpstreamError {
    UpstreamError::Request(e.without_url().to_string())
}

pub(crate) fn decode_error(e: reqwest::Error) -> UpstreamError {
    UpstreamError::Decode(e.without_url().to_string())
}

/// Pass successful responses through; turn anything else into
/// `UpstreamError::Status` with a truncated, secret-free body.
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
    secret: &str,
) -> Result<reqwest::Response, UpstreamError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body: scrub(&body, secret),
    })
}

/// Redact `secret` from `text` and cap its length.
pub(crate) fn scrub(text: &str, secret: &str) -> String {
    let redacted = if secret.is_empty() {
        text.to_string()
    } else {
        text.replace(secret, "***")
    };
    let trimmed = redacted.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
    out.push('…');
    out
}
