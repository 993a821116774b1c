use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use mediarelay_upstream::{
    chat, pexels, transcode, weather, youtube, ChatCompletion, FfmpegTranscoder,
    OpenAiChatClient, OpenWeatherClient, PexelsClient, PhotoSearch, VideoSearch,
    WeatherForecast, YouTubeClient,
};

use crate::gating::GatingTable;
use crate::state::Upstreams;

/// Process configuration, read once at startup from flags and environment.
#[derive(Debug, Clone, Args)]
pub struct RelayConfig {
    /// Address to bind
    #[arg(long, env = "RELAY_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// JSON file holding issued API keys
    #[arg(long, env = "RELAY_KEY_STORE", default_value = "apiKeys.json")]
    pub key_store: PathBuf,

    /// Directory for temporary audio files
    #[arg(long, env = "RELAY_AUDIO_DIR", default_value = "audio")]
    pub audio_dir: PathBuf,

    /// Directory holding generate-api-key.html and other static files
    #[arg(long, env = "DIR_GENERATE_KEY")]
    pub static_dir: Option<PathBuf>,

    /// Comma-separated routes that require an API key, or "none"
    #[arg(
        long,
        env = "RELAY_GATED_ROUTES",
        default_value = "music-download",
        value_parser = GatingTable::parse_list
    )]
    pub gated_routes: GatingTable,

    #[command(flatten)]
    pub service: ServiceInfo,

    #[command(flatten)]
    pub upstream: UpstreamConfig,
}

impl RelayConfig {
    /// Refuse a static directory that contains the key store, since the
    /// fallback file server would publish every issued token.
    pub fn check_static_dir(&self) -> Result<()> {
        let Some(static_dir) = &self.static_dir else {
            return Ok(());
        };
        let static_root = resolve_path(static_dir)
            .with_context(|| format!("resolving static dir {}", static_dir.display()))?;
        let store = resolve_path(&self.key_store)
            .with_context(|| format!("resolving key store {}", self.key_store.display()))?;
        if store.starts_with(&static_root) {
            bail!(
                "key store {} is inside static dir {}; move one of them",
                store.display(),
                static_root.display()
            );
        }
        Ok(())
    }
}

/// Canonical form of `path`, which need not exist yet. The nearest existing
/// ancestor is canonicalized and the missing components re-appended.
fn resolve_path(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        match std::fs::canonicalize(existing) {
            Ok(base) => {
                return Ok(missing
                    .iter()
                    .rev()
                    .fold(base, |acc: PathBuf, name| acc.join(name)));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(e);
                };
                missing.push(name.to_os_string());
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fields published by the `/api` descriptor.
#[derive(Debug, Clone, Args)]
pub struct ServiceInfo {
    #[arg(long = "service-name", env = "NAME_API", default_value = "mediarelay")]
    pub name: String,

    #[arg(long = "service-version", env = "VERSION_API", default_value = env!("CARGO_PKG_VERSION"))]
    pub version: String,

    #[arg(long, env = "DEVELOPMENT_DAY", default_value = "")]
    pub development_day: String,

    #[arg(long, env = "AUTOR_API", default_value = "")]
    pub author: String,

    #[arg(long, env = "DONO_API", default_value = "")]
    pub owner: String,

    #[arg(long, env = "INFO_USE", default_value = "")]
    pub info: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: "mediarelay".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            development_day: String::new(),
            author: String::new(),
            owner: String::new(),
            info: String::new(),
        }
    }
}

/// Credentials, endpoints and binaries of the external collaborators.
#[derive(Clone, Args)]
pub struct UpstreamConfig {
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub youtube_api_key: Option<String>,

    #[arg(long, env = "YOUTUBE_API_URL", default_value = youtube::DEFAULT_BASE_URL)]
    pub youtube_api_url: String,

    #[arg(long, env = "PEXELS_API_KEY", hide_env_values = true)]
    pub pexels_api_key: Option<String>,

    #[arg(long, env = "PEXELS_API_URL", default_value = pexels::DEFAULT_BASE_URL)]
    pub pexels_api_url: String,

    #[arg(long, env = "WEATHER_API_KEY", hide_env_values = true)]
    pub weather_api_key: Option<String>,

    #[arg(long, env = "WEATHER_API_URL", default_value = weather::DEFAULT_BASE_URL)]
    pub weather_api_url: String,

    #[arg(long, env = "CHAT_API_KEY", hide_env_values = true)]
    pub chat_api_key: Option<String>,

    #[arg(long, env = "CHAT_API_URL", default_value = chat::DEFAULT_BASE_URL)]
    pub chat_api_url: String,

    #[arg(long, env = "CHAT_MODEL", default_value = chat::DEFAULT_MODEL)]
    pub chat_model: String,

    #[arg(long, env = "YTDLP_BIN", default_value = "yt-dlp")]
    pub ytdlp_bin: String,

    #[arg(long, env = "FFMPEG_BIN", default_value = "ffmpeg")]
    pub ffmpeg_bin: String,

    /// MP3 bitrate in kbps
    #[arg(long, env = "AUDIO_BITRATE", default_value_t = transcode::DEFAULT_BITRATE_KBPS)]
    pub audio_bitrate: u32,
}

fn redact(value: &Option<String>) -> &'static str {
    match value {
        Some(_) => "<set>",
        None => "<unset>",
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("youtube_api_key", &redact(&self.youtube_api_key))
            .field("youtube_api_url", &self.youtube_api_url)
            .field("pexels_api_key", &redact(&self.pexels_api_key))
            .field("pexels_api_url", &self.pexels_api_url)
            .field("weather_api_key", &redact(&self.weather_api_key))
            .field("weather_api_url", &self.weather_api_url)
            .field("chat_api_key", &redact(&self.chat_api_key))
            .field("chat_api_url", &self.chat_api_url)
            .field("chat_model", &self.chat_model)
            .field("ytdlp_bin", &self.ytdlp_bin)
            .field("ffmpeg_bin", &self.ffmpeg_bin)
            .field("audio_bitrate", &self.audio_bitrate)
            .finish()
    }
}

/// Treat an empty credential the same as an absent one.
fn credential(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl UpstreamConfig {
    /// Wire in every collaborator whose credential is present. The
    /// transcoder needs no credential and is always available.
    pub fn build(&self) -> Upstreams {
        let client = reqwest::Client::new();
        Upstreams {
            video: credential(&self.youtube_api_key).map(|key| {
                Arc::new(YouTubeClient::new(client.clone(), &self.youtube_api_url, key))
                    as Arc<dyn VideoSearch>
            }),
            transcoder: Arc::new(FfmpegTranscoder::new(
                &self.ytdlp_bin,
                &self.ffmpeg_bin,
                self.audio_bitrate,
            )),
            photos: credential(&self.pexels_api_key).map(|key| {
                Arc::new(PexelsClient::new(client.clone(), &self.pexels_api_url, key))
                    as Arc<dyn PhotoSearch>
            }),
            weather: credential(&self.weather_api_key).map(|key| {
                Arc::new(OpenWeatherClient::new(client.clone(), &self.weather_api_url, key))
                    as Arc<dyn WeatherForecast>
            }),
            chat: credential(&self.chat_api_key).map(|key| {
                Arc::new(OpenAiChatClient::new(
                    client.clone(),
                    &self.chat_api_url,
                    key,
                    &self.chat_model,
                )) as Arc<dyn ChatCompletion>
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::gating::RouteId;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: RelayConfig,
    }

    fn parse(args: &[&str]) -> RelayConfig {
        let mut argv = vec!["mediarelay-server"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().config
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--port",
            "8080",
            "--key-store",
            "/tmp/keys.json",
            "--gated-routes",
            "music-download,weather",
            "--youtube-api-key",
            "yt",
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.key_store, PathBuf::from("/tmp/keys.json"));
        assert_eq!(
            config.gated_routes.gated_routes(),
            vec![RouteId::MusicDownload, RouteId::Weather]
        );
        assert_eq!(config.upstream.youtube_api_key.as_deref(), Some("yt"));
    }

    #[test]
    fn unknown_gated_route_is_rejected() {
        let result = TestCli::try_parse_from(["mediarelay-server", "--gated-routes", "everything"]);
        assert!(result.is_err());
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let config = parse(&["--chat-api-key", "sk-live-very-secret"]);
        let debug = format!("{:?}", config.upstream);
        assert!(!debug.contains("sk-live-very-secret"), "{debug}");
        assert!(debug.contains("<set>"));
    }

    #[test]
    fn key_store_inside_static_dir_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let store = tmp.path().join("apiKeys.json");
        std::fs::write(&store, "[]").unwrap();

        let config = parse(&[
            "--static-dir",
            tmp.path().to_str().unwrap(),
            "--key-store",
            store.to_str().unwrap(),
        ]);
        let err = config.check_static_dir().unwrap_err();
        assert!(err.to_string().contains("inside static dir"), "{err}");
    }

    #[test]
    fn key_store_not_yet_created_under_static_dir_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let store = tmp.path().join("data/keys/apiKeys.json");

        let config = parse(&[
            "--static-dir",
            tmp.path().to_str().unwrap(),
            "--key-store",
            store.to_str().unwrap(),
        ]);
        assert!(config.check_static_dir().is_err());
    }

    #[test]
    fn key_store_beside_static_dir_is_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let public = tmp.path().join("static");
        std::fs::create_dir(&public).unwrap();
        let store = tmp.path().join("apiKeys.json");

        let config = parse(&[
            "--static-dir",
            public.to_str().unwrap(),
            "--key-store",
            store.to_str().unwrap(),
        ]);
        config.check_static_dir().unwrap();

        let config = parse(&["--key-store", store.to_str().unwrap()]);
        config.check_static_dir().unwrap();
    }

    #[test]
    fn blank_credentials_leave_collaborator_unwired() {
        let config = parse(&["--pexels-api-key", "  ", "--weather-api-key", "owm"]);
        let upstreams = config.upstream.build();
        assert!(upstreams.photos.is_none());
        assert!(upstreams.weather.is_some());
    }
}
