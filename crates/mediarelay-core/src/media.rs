//! Reshaped records republished by the relay routes.

use serde::{Deserialize, Serialize};

/// A single video hit from the video search collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub title: String,
    pub video_url: String,
    pub thumbnail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
}

impl VideoSummary {
    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={video_id}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub url: String,
    pub photographer: String,
    pub photographer_url: String,
    #[serde(default)]
    pub alt: String,
    pub src: PhotoSources,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoSources {
    pub original: String,
    pub large: String,
    pub medium: String,
    pub small: String,
}

/// One step of a weather forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastEntry {
    pub time: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub description: String,
    pub wind_speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub model: String,
}
