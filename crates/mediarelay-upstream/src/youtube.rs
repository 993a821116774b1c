use std::collections::HashMap;

use async_trait::async_trait;
use mediarelay_core::VideoSummary;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{decode_error, ensure_success, request_error, UpstreamError, VideoSearch};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// YouTube Data API v3 client: `search.list` for hits, `videos.list` for
/// view counts.
pub struct YouTubeClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(client: Client, base_url: &str, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn view_counts(&self, ids: &[String]) -> Result<HashMap<String, u64>, UpstreamError> {
        let ids = ids.join(",");
        let resp = self
            .client
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("part", "statistics"),
                ("id", ids.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(request_error)?;
        let resp = ensure_success(resp, &self.api_key).await?;
        let body: VideoListResponse = resp.json().await.map_err(decode_error)?;

        Ok(body
            .items
            .into_iter()
            .filter_map(|item| {
                let count = item.statistics?.view_count?.parse().ok()?;
                Some((item.id, count))
            })
            .collect())
    }
}

#[derive(Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct Snippet {
    title: String,
    #[serde(rename = "channelTitle")]
    channel_title: Option<String>,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
struct VideoItem {
    id: String,
    statistics: Option<Statistics>,
}

#[derive(Deserialize)]
struct Statistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
}

/// Largest available thumbnail, preferring `high`.
fn pick_thumbnail(thumbnails: &HashMap<String, Thumbnail>) -> String {
    ["high", "medium", "default"]
        .iter()
        .find_map(|size| thumbnails.get(*size))
        .map(|t| t.url.clone())
        .unwrap_or_default()
}

#[async_trait]
impl VideoSearch for YouTubeClient {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<VideoSummary>, UpstreamError> {
        let max_results = limit.to_string();
        let resp = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(request_error)?;
        let resp = ensure_success(resp, &self.api_key).await?;
        let body: SearchListResponse = resp.json().await.map_err(decode_error)?;

        let mut hits: Vec<(String, VideoSummary)> = body
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.video_id?;
                let summary = VideoSummary {
                    title: item.snippet.title,
                    video_url: VideoSummary::watch_url(&id),
                    thumbnail: pick_thumbnail(&item.snippet.thumbnails),
                    channel: item.snippet.channel_title,
                    view_count: None,
                };
                Some((id, summary))
            })
            .collect();
        debug!("youtube: {} hits for {query:?}", hits.len());

        if hits.is_empty() {
            return Ok(Vec::new());
        }

        // View counts are decoration; a failed lookup still returns the hits.
        let ids: Vec<String> = hits.iter().map(|(id, _)| id.clone()).collect();
        match self.view_counts(&ids).await {
            Ok(counts) => {
                for (id, summary) in hits.iter_mut() {
                    summary.view_count = counts.get(id.as_str()).copied();
                }
            }
            Err(e) => warn!("youtube: view count lookup failed: {e}"),
        }

        Ok(hits.into_iter().map(|(_, summary)| summary).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_thumbnail_prefers_high() {
        let mut thumbs = HashMap::new();
        thumbs.insert("default".to_string(), Thumbnail { url: "d".into() });
        thumbs.insert("high".to_string(), Thumbnail { url: "h".into() });
        assert_eq!(pick_thumbnail(&thumbs), "h");
    }

    #[test]
    fn pick_thumbnail_falls_back() {
        let mut thumbs = HashMap::new();
        thumbs.insert("default".to_string(), Thumbnail { url: "d".into() });
        assert_eq!(pick_thumbnail(&thumbs), "d");
        assert_eq!(pick_thumbnail(&HashMap::new()), "");
    }

    #[test]
    fn search_response_skips_non_video_items() {
        let raw = r#"{"items":[
            {"id":{"kind":"youtube#channel","channelId":"c1"},"snippet":{"title":"chan","thumbnails":{}}},
            {"id":{"kind":"youtube#video","videoId":"v1"},"snippet":{"title":"vid","channelTitle":"Ch","thumbnails":{"high":{"url":"t"}}}}
        ]}"#;
        let body: SearchListResponse = serde_json::from_str(raw).unwrap();
        let ids: Vec<_> = body.items.iter().filter_map(|i| i.id.video_id.clone()).collect();
        assert_eq!(ids, vec!["v1".to_string()]);
    }
}
