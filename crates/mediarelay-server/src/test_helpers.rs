use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{body::Body, http::Response, Router};
use chrono::Utc;
use mediarelay_store::LocalKeyStore;
use mediarelay_upstream::mock::{
    MockChat, MockPhotoSearch, MockTranscoder, MockVideoSearch, MockWeather,
};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

use crate::config::ServiceInfo;
use crate::gating::GatingTable;
use crate::state::{InnerAppState, Upstreams};

/// Every collaborator replaced by its in-process mock.
pub fn mock_upstreams() -> Upstreams {
    Upstreams {
        video: Some(Arc::new(MockVideoSearch::new())),
        transcoder: Arc::new(MockTranscoder::new()),
        photos: Some(Arc::new(MockPhotoSearch::new())),
        weather: Some(Arc::new(MockWeather::new())),
        chat: Some(Arc::new(MockChat::new())),
    }
}

/// A router over a temp key store and audio directory. Both are removed
/// when the `TestApp` is dropped.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<LocalKeyStore>,
    pub audio_dir: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    /// Issue a key straight through the store, returning the raw token.
    pub async fn issue_key(&self, label: &str) -> String {
        crate::auth::issue_key(self.store.as_ref(), label, Utc::now())
            .await
            .unwrap()
            .key
    }
}

pub struct TestAppBuilder {
    gating: GatingTable,
    upstreams: Upstreams,
    static_dir: Option<PathBuf>,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            gating: GatingTable::default_policy(),
            upstreams: mock_upstreams(),
            static_dir: None,
        }
    }

    pub fn gating(mut self, gating: GatingTable) -> Self {
        self.gating = gating;
        self
    }

    pub fn upstreams(mut self, upstreams: Upstreams) -> Self {
        self.upstreams = upstreams;
        self
    }

    pub fn static_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.static_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalKeyStore::new(dir.path().join("apiKeys.json")));
        let audio_dir = dir.path().join("audio");

        let state = Arc::new(InnerAppState {
            keys: store.clone(),
            upstreams: self.upstreams,
            gating: self.gating,
            service: ServiceInfo::default(),
            audio_dir: audio_dir.clone(),
            static_dir: self.static_dir,
        });

        TestApp {
            router: crate::app(state),
            store,
            audio_dir,
            _dir: dir,
        }
    }
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn `router` on a random port. Returns the TestServer with the
/// `base_url` (e.g. "http://127.0.0.1:12345").
pub async fn spawn_test_server(router: Router) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    TestServer {
        base_url,
        _handle: handle,
    }
}
