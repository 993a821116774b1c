use std::path::PathBuf;
use std::sync::Arc;

use mediarelay_store::KeyStore;
use mediarelay_upstream::{ChatCompletion, PhotoSearch, Transcoder, VideoSearch, WeatherForecast};

use crate::config::{RelayConfig, ServiceInfo};
use crate::gating::GatingTable;

/// The collaborators wired into this process. `None` means the credential
/// was not configured and the matching routes answer 503.
#[derive(Clone)]
pub struct Upstreams {
    pub video: Option<Arc<dyn VideoSearch>>,
    pub transcoder: Arc<dyn Transcoder>,
    pub photos: Option<Arc<dyn PhotoSearch>>,
    pub weather: Option<Arc<dyn WeatherForecast>>,
    pub chat: Option<Arc<dyn ChatCompletion>>,
}

pub struct InnerAppState {
    pub keys: Arc<dyn KeyStore>,
    pub upstreams: Upstreams,
    pub gating: GatingTable,
    pub service: ServiceInfo,
    pub audio_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
}

pub type AppState = Arc<InnerAppState>;

impl InnerAppState {
    pub fn from_config(config: &RelayConfig, keys: Arc<dyn KeyStore>) -> AppState {
        Arc::new(Self {
            keys,
            upstreams: config.upstream.build(),
            gating: config.gated_routes.clone(),
            service: config.service.clone(),
            audio_dir: config.audio_dir.clone(),
            static_dir: config.static_dir.clone(),
        })
    }
}
