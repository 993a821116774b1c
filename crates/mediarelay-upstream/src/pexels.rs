use async_trait::async_trait;
use mediarelay_core::{Photo, PhotoSources};
use reqwest::Client;
use serde::Deserialize;

use crate::{decode_error, ensure_success, request_error, PhotoSearch, UpstreamError};

pub const DEFAULT_BASE_URL: &str = "https://api.pexels.com/v1";

pub struct PexelsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PexelsClient {
    pub fn new(client: Client, base_url: &str, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Deserialize)]
struct PexelsPhoto {
    id: u64,
    width: u32,
    height: u32,
    url: String,
    photographer: String,
    photographer_url: String,
    #[serde(default)]
    alt: Option<String>,
    src: PexelsSrc,
}

#[derive(Deserialize)]
struct PexelsSrc {
    original: String,
    large: String,
    medium: String,
    small: String,
}

impl From<PexelsPhoto> for Photo {
    fn from(p: PexelsPhoto) -> Self {
        Photo {
            id: p.id,
            width: p.width,
            height: p.height,
            url: p.url,
            photographer: p.photographer,
            photographer_url: p.photographer_url,
            alt: p.alt.unwrap_or_default(),
            src: PhotoSources {
                original: p.src.original,
                large: p.src.large,
                medium: p.src.medium,
                small: p.src.small,
            },
        }
    }
}

#[async_trait]
impl PhotoSearch for PexelsClient {
    async fn search(&self, query: &str, per_page: u32) -> Result<Vec<Photo>, UpstreamError> {
        let per_page = per_page.to_string();
        let resp = self
            .client
            .get(format!("{}/search", self.base_url))
            .header("Authorization", &self.api_key)
            .query(&[("query", query), ("per_page", per_page.as_str())])
            .send()
            .await
            .map_err(request_error)?;
        let resp = ensure_success(resp, &self.api_key).await?;
        let body: SearchResponse = resp.json().await.map_err(decode_error)?;
        Ok(body.photos.into_iter().map(Photo::from).collect())
    }
}
