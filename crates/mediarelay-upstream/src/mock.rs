//! In-process collaborators with canned results, for tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mediarelay_core::{ChatReply, ForecastEntry, Photo, PhotoSources, VideoSummary};
use serde_json::json;

use crate::{
    ChatCompletion, ChatRequest, PhotoSearch, Transcoder, Units, UpstreamError, VideoSearch,
    WeatherForecast, WeatherReport,
};

/// A video search that returns a fixed hit list and counts its calls.
pub struct MockVideoSearch {
    results: Vec<VideoSummary>,
    fail: bool,
    calls: AtomicUsize,
}

impl Default for MockVideoSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVideoSearch {
    pub fn new() -> Self {
        Self {
            results: vec![sample_video("dQw4w9WgXcQ", "Sample Song")],
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_results(mut self, results: Vec<VideoSummary>) -> Self {
        self.results = results;
        self
    }

    pub fn with_fail(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn sample_video(id: &str, title: &str) -> VideoSummary {
    VideoSummary {
        title: title.to_string(),
        video_url: VideoSummary::watch_url(id),
        thumbnail: format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg"),
        channel: Some("Sample Channel".into()),
        view_count: Some(1_234),
    }
}

#[async_trait]
impl VideoSearch for MockVideoSearch {
    async fn search(&self, _query: &str, limit: u32) -> Result<Vec<VideoSummary>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(UpstreamError::Status {
                status: 403,
                body: "quotaExceeded".into(),
            });
        }
        Ok(self.results.iter().take(limit as usize).cloned().collect())
    }
}

/// A transcoder that writes a fixed payload, or a partial one before failing.
pub struct MockTranscoder {
    payload: Vec<u8>,
    fail: bool,
    calls: AtomicUsize,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    pub fn new() -> Self {
        Self {
            payload: b"ID3\x04\x00mock-mp3-frames".to_vec(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_fail(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    async fn extract_audio(&self, _video_url: &str, dest: &Path) -> Result<(), UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            // Leave a half-written artifact behind, like a crashed encoder.
            let _ = tokio::fs::write(dest, &self.payload[..self.payload.len() / 2]).await;
            return Err(UpstreamError::Transcode("mock encoder crashed".into()));
        }
        tokio::fs::write(dest, &self.payload)
            .await
            .map_err(|e| UpstreamError::Transcode(format!("write {}: {e}", dest.display())))
    }
}

pub struct MockPhotoSearch {
    fail: bool,
    last_query: std::sync::Mutex<Option<(String, u32)>>,
}

impl Default for MockPhotoSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPhotoSearch {
    pub fn new() -> Self {
        Self {
            fail: false,
            last_query: std::sync::Mutex::new(None),
        }
    }

    pub fn with_fail(mut self) -> Self {
        self.fail = true;
        self
    }

    /// The `(query, per_page)` of the most recent call.
    pub fn last_query(&self) -> Option<(String, u32)> {
        self.last_query.lock().ok().and_then(|q| q.clone())
    }
}

#[async_trait]
impl PhotoSearch for MockPhotoSearch {
    async fn search(&self, query: &str, per_page: u32) -> Result<Vec<Photo>, UpstreamError> {
        if let Ok(mut last) = self.last_query.lock() {
            *last = Some((query.to_string(), per_page));
        }
        if self.fail {
            return Err(UpstreamError::Request("connection refused".into()));
        }
        Ok((0..per_page.min(3) as u64)
            .map(|i| Photo {
                id: 1000 + i,
                width: 4000,
                height: 3000,
                url: format!("https://www.pexels.com/photo/{}", 1000 + i),
                photographer: "Jane Doe".into(),
                photographer_url: "https://www.pexels.com/@jane".into(),
                alt: format!("{query} #{i}"),
                src: PhotoSources {
                    original: format!("https://images.pexels.com/{i}/original.jpg"),
                    large: format!("https://images.pexels.com/{i}/large.jpg"),
                    medium: format!("https://images.pexels.com/{i}/medium.jpg"),
                    small: format!("https://images.pexels.com/{i}/small.jpg"),
                },
            })
            .collect())
    }
}

pub struct MockWeather {
    known_city: String,
}

impl Default for MockWeather {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWeather {
    pub fn new() -> Self {
        Self {
            known_city: "Maputo".into(),
        }
    }
}

#[async_trait]
impl WeatherForecast for MockWeather {
    async fn forecast(
        &self,
        city: &str,
        _units: Units,
        days: u32,
    ) -> Result<WeatherReport, UpstreamError> {
        if !city.eq_ignore_ascii_case(&self.known_city) {
            return Err(UpstreamError::NotFound(format!("city {city:?}")));
        }
        let steps = days * crate::weather::STEPS_PER_DAY;
        let entries: Vec<ForecastEntry> = (0..steps)
            .map(|i| ForecastEntry {
                time: format!("step-{i}"),
                temperature: 25.0,
                feels_like: 26.0,
                humidity: 70,
                description: "clear sky".into(),
                wind_speed: 2.5,
            })
            .collect();
        Ok(WeatherReport {
            city: self.known_city.clone(),
            raw: json!({ "cnt": steps, "city": { "name": self.known_city } }),
            entries,
        })
    }
}

pub struct MockChat {
    fail: bool,
}

impl Default for MockChat {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChat {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn with_fail(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl ChatCompletion for MockChat {
    async fn reply(&self, request: &ChatRequest) -> Result<ChatReply, UpstreamError> {
        if self.fail {
            return Err(UpstreamError::Status {
                status: 429,
                body: "rate limited".into(),
            });
        }
        Ok(ChatReply {
            reply: format!("echo: {}", request.message),
            model: "mock-model".into(),
        })
    }
}
