//! Strategy A: sequential stream pull.
//!
//! Runs ffmpeg directly against the manifest URL with connection-level
//! auto-reconnect, re-encoding to MP3. Each attempt is verified with
//! ffprobe before it counts as a success; exhausted retries surface as a
//! single `DownloadFailed`.

use super::{probe_duration, AudioAsset, ProgressFn};
use crate::config::DownloadSettings;
use crate::error::{OpptakError, Result};
use crate::retry::{retry, RetryPolicy};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument};

#[instrument(skip_all)]
pub async fn pull_stream(
    settings: &DownloadSettings,
    manifest_url: &str,
    workdir: &Path,
    progress: ProgressFn,
) -> Result<AudioAsset> {
    let target = workdir.join("audio.mp3");
    let policy = RetryPolicy::exponential(
        settings.max_attempts,
        Duration::from_millis(settings.base_delay_ms),
    );

    info!("Pulling stream from {}", manifest_url);
    progress(0, 1);

    let duration = retry(policy, "stream pull", |attempt| {
        let target = target.clone();
        async move {
            debug!("Stream pull attempt {}", attempt);
            pull_once(manifest_url, &target).await?;

            // A file that exists but fails verification is a failed
            // attempt, not a success.
            match probe_duration(&target).await {
                Ok(duration) => Ok(duration),
                Err(e) => {
                    let _ = tokio::fs::remove_file(&target).await;
                    Err(e)
                }
            }
        }
    })
    .await?;

    progress(1, 1);

    let byte_size = tokio::fs::metadata(&target).await?.len();
    info!(
        "Stream pull complete: {:.1}s, {} bytes",
        duration, byte_size
    );

    Ok(AudioAsset {
        path: target,
        byte_size,
        duration_seconds: duration,
    })
}

/// One ffmpeg invocation against the remote manifest.
async fn pull_once(manifest_url: &str, dest: &Path) -> Result<()> {
    let result = Command::new("ffmpeg")
        .arg("-reconnect").arg("1")
        .arg("-reconnect_streamed").arg("1")
        .arg("-reconnect_delay_max").arg("5")
        .arg("-i").arg(manifest_url)
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
            Err(OpptakError::DownloadFailed(format!("ffmpeg failed: {err}")))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(OpptakError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(OpptakError::DownloadFailed(format!(
            "ffmpeg execution failed: {e}"
        ))),
    }
}
