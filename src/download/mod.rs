//! Audio retrieval and reassembly.
//!
//! Two interchangeable strategies produce a single local MP3 asset from a
//! remote manifest: a sequential stream pull through ffmpeg, or a parallel
//! segment fetch with bounded concurrency and reassembly. Both clean up
//! after themselves; a failed download leaves no partial asset.

mod segments;
mod stream;

pub use segments::fetch_segments;
pub use stream::pull_stream;

use crate::config::{DownloadSettings, DownloadStrategy};
use crate::error::{OpptakError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::instrument;

/// Progress callback: (completed units, total units).
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// A finished local audio asset, owned by the job that produced it until
/// handed to durable storage.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    pub path: PathBuf,
    pub byte_size: u64,
    pub duration_seconds: f64,
}

impl AudioAsset {
    /// Build an asset record from a verified file on disk.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let byte_size = tokio::fs::metadata(path).await?.len();
        let duration_seconds = probe_duration(path).await?;

        Ok(Self {
            path: path.to_path_buf(),
            byte_size,
            duration_seconds,
        })
    }
}

/// Download a session's audio into `workdir` using the configured strategy.
#[instrument(skip_all, fields(strategy = %settings.strategy))]
pub async fn download_session(
    settings: &DownloadSettings,
    manifest_url: &str,
    workdir: &Path,
    progress: ProgressFn,
) -> Result<AudioAsset> {
    match settings.strategy {
        DownloadStrategy::Stream => pull_stream(settings, manifest_url, workdir, progress).await,
        DownloadStrategy::Segments => {
            fetch_segments(settings, manifest_url, workdir, progress).await
        }
    }
}

/// Queries the duration of an audio file using ffprobe with JSON output.
///
/// Doubles as stream verification: a file that exists but has no decodable
/// audio stream fails here.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg("-show_streams")
        .arg("-select_streams").arg("a")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OpptakError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(OpptakError::DownloadFailed(format!("ffprobe failed: {e}")));
        }
    };

    if !output.status.success() {
        return Err(OpptakError::DownloadFailed("ffprobe returned error".into()));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|_| OpptakError::DownloadFailed("Invalid ffprobe output".into()))?;

    // No audio stream means the file is not a usable asset
    let has_audio = parsed["streams"]
        .as_array()
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    if !has_audio {
        return Err(OpptakError::DownloadFailed(
            "Output file contains no decodable audio stream".into(),
        ));
    }

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| *d > 0.0)
        .ok_or_else(|| OpptakError::DownloadFailed("Could not determine audio duration".into()))
}

/// Re-encode a source (file or concat list) to the target single-file MP3.
pub(crate) async fn encode_to_mp3(args_in: &[&str], dest: &Path) -> Result<()> {
    let result = Command::new("ffmpeg")
        .args(args_in)
        .arg("-vn")
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(OpptakError::DownloadFailed(format!(
                "ffmpeg encoding failed: {err}"
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(OpptakError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(OpptakError::DownloadFailed(format!("ffmpeg error: {e}"))),
    }
}
