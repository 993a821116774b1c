use std::path::Path;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{Transcoder, UpstreamError};

pub const DEFAULT_BITRATE_KBPS: u32 = 192;

/// Pipes `yt-dlp` (best audio stream to stdout) into `ffmpeg`, which encodes
/// MP3 with libmp3lame at a fixed bitrate.
pub struct FfmpegTranscoder {
    ytdlp_bin: String,
    ffmpeg_bin: String,
    bitrate_kbps: u32,
}

impl FfmpegTranscoder {
    pub fn new(ytdlp_bin: &str, ffmpeg_bin: &str, bitrate_kbps: u32) -> Self {
        Self {
            ytdlp_bin: ytdlp_bin.to_string(),
            ffmpeg_bin: ffmpeg_bin.to_string(),
            bitrate_kbps,
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("yt-dlp", "ffmpeg", DEFAULT_BITRATE_KBPS)
    }
}

fn stage_failed(stage: &str, output: &Output) -> UpstreamError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let code = output
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".into());
    UpstreamError::Transcode(format!(
        "{stage} exited with {code}: {}",
        crate::scrub(&stderr, "")
    ))
}

/// Killed by a signal, or exited with the shell's `128 + SIGPIPE` code.
fn broken_pipe(output: &Output) -> bool {
    matches!(output.status.code(), None | Some(141))
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn extract_audio(&self, video_url: &str, dest: &Path) -> Result<(), UpstreamError> {
        let mut fetch = Command::new(&self.ytdlp_bin)
            .args(["--quiet", "--no-playlist", "-f", "bestaudio", "-o", "-"])
            .arg(video_url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| UpstreamError::Transcode(format!("spawn {}: {e}", self.ytdlp_bin)))?;

        let audio_in: Stdio = fetch
            .stdout
            .take()
            .ok_or_else(|| UpstreamError::Transcode("no stdout from downloader".into()))?
            .try_into()
            .map_err(|e: std::io::Error| UpstreamError::Transcode(format!("pipe: {e}")))?;

        let encode = Command::new(&self.ffmpeg_bin)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i", "pipe:0", "-vn"])
            .args(["-codec:a", "libmp3lame", "-b:a"])
            .arg(format!("{}k", self.bitrate_kbps))
            .args(["-f", "mp3"])
            .arg(dest)
            .stdin(audio_in)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        debug!("transcoding {video_url} to {}", dest.display());
        let (encoded, fetched) = tokio::join!(encode, fetch.wait_with_output());

        let encoded = encoded
            .map_err(|e| UpstreamError::Transcode(format!("spawn {}: {e}", self.ffmpeg_bin)))?;
        let fetched = fetched
            .map_err(|e| UpstreamError::Transcode(format!("wait {}: {e}", self.ytdlp_bin)))?;

        // An encoder that dies early takes the downloader down with SIGPIPE,
        // so the encoder's own failure is the one to report.
        if !encoded.status.success() && (fetched.status.success() || broken_pipe(&fetched)) {
            return Err(stage_failed(&self.ffmpeg_bin, &encoded));
        }
        if !fetched.status.success() {
            return Err(stage_failed(&self.ytdlp_bin, &fetched));
        }
        if !encoded.status.success() {
            return Err(stage_failed(&self.ffmpeg_bin, &encoded));
        }

        let size = tokio::fs::metadata(dest)
            .await
            .map(|m| m.len())
            .map_err(|e| UpstreamError::Transcode(format!("stat {}: {e}", dest.display())))?;
        if size == 0 {
            return Err(UpstreamError::Transcode("encoder produced no audio".into()));
        }

        info!("transcoded {video_url} ({size} bytes)");
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    use super::*;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    // Stand-in for ffmpeg: copy stdin to the last argument.
    const FAKE_FFMPEG: &str = "for last; do :; done\ncat > \"$last\"";

    #[tokio::test]
    async fn pipes_downloader_output_into_encoder() {
        let tmp = tempfile::tempdir().unwrap();
        let ytdlp = script(tmp.path(), "yt-dlp", "printf 'ID3-fake-audio'");
        let ffmpeg = script(tmp.path(), "ffmpeg", FAKE_FFMPEG);
        let dest = tmp.path().join("out.mp3");

        let transcoder = FfmpegTranscoder::new(
            ytdlp.to_str().unwrap(),
            ffmpeg.to_str().unwrap(),
            DEFAULT_BITRATE_KBPS,
        );
        transcoder
            .extract_audio("https://www.youtube.com/watch?v=abc", &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"ID3-fake-audio");
    }

    #[tokio::test]
    async fn downloader_failure_is_reported_with_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        let ytdlp = script(
            tmp.path(),
            "yt-dlp",
            "echo 'ERROR: Video unavailable' >&2\nexit 1",
        );
        let ffmpeg = script(tmp.path(), "ffmpeg", FAKE_FFMPEG);
        let dest = tmp.path().join("out.mp3");

        let transcoder = FfmpegTranscoder::new(
            ytdlp.to_str().unwrap(),
            ffmpeg.to_str().unwrap(),
            DEFAULT_BITRATE_KBPS,
        );
        let err = transcoder
            .extract_audio("https://www.youtube.com/watch?v=gone", &dest)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, UpstreamError::Transcode(_)));
        assert!(msg.contains("Video unavailable"), "{msg}");
    }

    #[tokio::test]
    async fn encoder_failure_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let ytdlp = script(tmp.path(), "yt-dlp", "printf 'audio'");
        let ffmpeg = script(
            tmp.path(),
            "ffmpeg",
            "cat > /dev/null\necho 'Unknown encoder libmp3lame' >&2\nexit 1",
        );
        let dest = tmp.path().join("out.mp3");

        let transcoder = FfmpegTranscoder::new(
            ytdlp.to_str().unwrap(),
            ffmpeg.to_str().unwrap(),
            DEFAULT_BITRATE_KBPS,
        );
        let err = transcoder.extract_audio("u", &dest).await.unwrap_err();
        assert!(err.to_string().contains("Unknown encoder"), "{err}");
    }

    #[tokio::test]
    async fn encoder_failure_wins_over_broken_pipe_in_downloader() {
        let tmp = tempfile::tempdir().unwrap();
        let ytdlp = script(tmp.path(), "yt-dlp", "head -c 5000000 /dev/zero");
        let ffmpeg = script(
            tmp.path(),
            "ffmpeg",
            "echo 'Unknown encoder libmp3lame' >&2\nexit 1",
        );
        let dest = tmp.path().join("out.mp3");

        let transcoder = FfmpegTranscoder::new(
            ytdlp.to_str().unwrap(),
            ffmpeg.to_str().unwrap(),
            DEFAULT_BITRATE_KBPS,
        );
        let err = transcoder.extract_audio("u", &dest).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Unknown encoder libmp3lame"), "{msg}");
        assert!(msg.contains(ffmpeg.to_str().unwrap()), "{msg}");
    }

    #[tokio::test]
    async fn empty_output_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let ytdlp = script(tmp.path(), "yt-dlp", "true");
        let ffmpeg = script(tmp.path(), "ffmpeg", FAKE_FFMPEG);
        let dest = tmp.path().join("out.mp3");

        let transcoder = FfmpegTranscoder::new(
            ytdlp.to_str().unwrap(),
            ffmpeg.to_str().unwrap(),
            DEFAULT_BITRATE_KBPS,
        );
        let err = transcoder.extract_audio("u", &dest).await.unwrap_err();
        assert!(err.to_string().contains("no audio"), "{err}");
    }

    #[tokio::test]
    async fn missing_binary_is_a_transcode_error() {
        let tmp = tempfile::tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new(
            "/nonexistent/yt-dlp",
            "/nonexistent/ffmpeg",
            DEFAULT_BITRATE_KBPS,
        );
        let err = transcoder
            .extract_audio("u", &tmp.path().join("out.mp3"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("spawn /nonexistent/yt-dlp"), "{err}");
    }
}
