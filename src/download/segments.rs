//! Strategy B: parallel segment fetch and reassembly.
//!
//! Parses the manifest into an ordered segment list, fetches segments
//! through a bounded worker pool with independent per-segment retry
//! budgets, tolerates a small fraction of failures, and reassembles the
//! survivors in manifest order into a single MP3.

use super::{encode_to_mp3, AudioAsset, ProgressFn};
use crate::config::DownloadSettings;
use crate::error::{OpptakError, Result};
use crate::retry::{retry, RetryPolicy};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// One segment of the manifest, scoped to a single download attempt.
#[derive(Debug, Clone)]
pub struct SegmentDescriptor {
    pub index: usize,
    pub source_uri: String,
}

#[instrument(skip_all)]
pub async fn fetch_segments(
    settings: &DownloadSettings,
    manifest_url: &str,
    workdir: &Path,
    progress: ProgressFn,
) -> Result<AudioAsset> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.segment_timeout_secs))
        .build()
        .map_err(|e| OpptakError::DownloadFailed(format!("Failed to build HTTP client: {e}")))?;

    let manifest_text = client
        .get(manifest_url)
        .send()
        .await
        .map_err(|e| OpptakError::DownloadFailed(format!("Manifest fetch failed: {e}")))?
        .error_for_status()
        .map_err(|e| OpptakError::DownloadFailed(format!("Manifest fetch failed: {e}")))?
        .text()
        .await
        .map_err(|e| OpptakError::DownloadFailed(format!("Manifest read failed: {e}")))?;

    let segments = parse_manifest(manifest_url, &manifest_text)?;
    let total = segments.len();
    info!("Manifest lists {} segments", total);

    let segment_dir = workdir.join("segments");
    tokio::fs::create_dir_all(&segment_dir).await?;

    let policy = RetryPolicy::fixed(
        settings.segment_attempts,
        Duration::from_millis(settings.segment_delay_ms),
    );

    let (mut succeeded, failed) = fetch_all(
        &client,
        policy,
        segments,
        &segment_dir,
        settings.concurrency.max(1),
        &progress,
    )
    .await;

    if exceeds_failure_threshold(failed, total, settings.failure_rate_threshold) {
        // Leave no partial state behind for reuse.
        let _ = tokio::fs::remove_dir_all(&segment_dir).await;
        return Err(OpptakError::DownloadFailed(format!(
            "{} of {} segments failed (threshold {:.0}%)",
            failed,
            total,
            settings.failure_rate_threshold * 100.0
        )));
    }

    succeeded.sort_by_key(|(index, _)| *index);
    let ordered: Vec<PathBuf> = succeeded.into_iter().map(|(_, path)| path).collect();

    let target = workdir.join("audio.mp3");
    reassemble(&ordered, workdir, &target).await?;

    let _ = tokio::fs::remove_dir_all(&segment_dir).await;

    let asset = AudioAsset::from_file(&target).await?;
    info!(
        "Reassembled {} segments into {:.1}s of audio",
        ordered.len(),
        asset.duration_seconds
    );
    Ok(asset)
}

/// Parse a playlist manifest into ordered segment descriptors.
///
/// Comment/directive lines start with '#'; remaining lines are segment
/// URIs, resolved against the manifest URL when relative.
pub fn parse_manifest(manifest_url: &str, text: &str) -> Result<Vec<SegmentDescriptor>> {
    let base = Url::parse(manifest_url)
        .map_err(|e| OpptakError::DownloadFailed(format!("Invalid manifest URL: {e}")))?;

    let mut segments = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let resolved = base
            .join(line)
            .map_err(|e| OpptakError::DownloadFailed(format!("Invalid segment URI {line}: {e}")))?;

        segments.push(SegmentDescriptor {
            index: segments.len(),
            source_uri: resolved.to_string(),
        });
    }

    if segments.is_empty() {
        return Err(OpptakError::DownloadFailed(
            "Manifest contains no segments".into(),
        ));
    }

    Ok(segments)
}

/// Fetch every segment through a bounded pool, returning successes (index
/// plus file path) and the failure count.
///
/// Outcomes arrive in completion order, so manifest order is re-imposed
/// at reassembly time via the index.
async fn fetch_all(
    client: &reqwest::Client,
    policy: RetryPolicy,
    segments: Vec<SegmentDescriptor>,
    segment_dir: &Path,
    concurrency: usize,
    progress: &ProgressFn,
) -> (Vec<(usize, PathBuf)>, usize) {
    let total = segments.len() as u64;
    let mut succeeded: Vec<(usize, PathBuf)> = Vec::with_capacity(segments.len());
    let mut failed = 0usize;
    let mut completed = 0u64;

    let mut fetches = stream::iter(segments.into_iter())
        .map(|segment| {
            let client = client.clone();
            let dest = segment_dir.join(format!("segment_{:05}.part", segment.index));
            async move {
                let outcome = fetch_one(&client, policy, &segment, &dest).await;
                (segment.index, dest, outcome)
            }
        })
        .buffer_unordered(concurrency);

    while let Some((index, dest, outcome)) = fetches.next().await {
        completed += 1;
        // Failures still advance progress; only successes count toward
        // the failure-rate check.
        progress(completed, total);

        match outcome {
            Ok(()) => succeeded.push((index, dest)),
            Err(e) => {
                warn!("Segment {} failed after retries: {}", index, e);
                failed += 1;
            }
        }
    }

    (succeeded, failed)
}

/// Whether the failed fraction exceeds the load-bearing abort threshold.
pub fn exceeds_failure_threshold(failed: usize, total: usize, threshold: f64) -> bool {
    if total == 0 {
        return true;
    }
    failed as f64 / total as f64 > threshold
}

/// Fetch a single segment to disk under its own retry budget.
async fn fetch_one(
    client: &reqwest::Client,
    policy: RetryPolicy,
    segment: &SegmentDescriptor,
    dest: &Path,
) -> Result<()> {
    let op = format!("segment {}", segment.index);
    retry(policy, &op, |attempt| async move {
        debug!("Fetching segment {} (attempt {})", segment.index, attempt);

        let bytes = client
            .get(&segment.source_uri)
            .send()
            .await
            .map_err(|e| OpptakError::DownloadFailed(format!("fetch failed: {e}")))?
            .error_for_status()
            .map_err(|e| OpptakError::DownloadFailed(format!("fetch failed: {e}")))?
            .bytes()
            .await
            .map_err(|e| OpptakError::DownloadFailed(format!("read failed: {e}")))?;

        if bytes.is_empty() {
            return Err(OpptakError::DownloadFailed("empty segment body".into()));
        }

        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    })
    .await
}

/// Concatenate ordered segment files and re-encode to a single MP3 via
/// ffmpeg's concat demuxer.
async fn reassemble(ordered: &[PathBuf], workdir: &Path, target: &Path) -> Result<()> {
    let list_path = workdir.join("concat.txt");
    let mut list = String::new();
    for path in ordered {
        // concat demuxer escaping: single quotes around the path
        list.push_str(&format!("file '{}'\n", path.display()));
    }
    tokio::fs::write(&list_path, list).await?;

    let list_str = list_path.to_string_lossy().to_string();
    let result = encode_to_mp3(
        &["-f", "concat", "-safe", "0", "-i", &list_str],
        target,
    )
    .await;

    let _ = tokio::fs::remove_file(&list_path).await;
    result
}
