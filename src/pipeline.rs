//! Per-job pipeline orchestration.
//!
//! Coordinates one session end to end: resolve, cost pre-check, download,
//! transcription, synthesis, exact charges, and persistence. Each job runs
//! as one background task; the Status Tracker is the only channel back to
//! pollers, so every terminal outcome lands there as `completed` or
//! `error` with a readable message.

use crate::billing::{CostGuard, CreditLedger, HttpCreditLedger, NoopLedger};
use crate::config::Settings;
use crate::download::{self, ProgressFn};
use crate::error::Result;
use crate::source::{HttpSourceProvider, SessionMetadata, SourceProvider};
use crate::status::{JobKey, StatusTracker};
use crate::storage::{LocalObjectStore, ObjectStore};
use crate::synthesis::{SessionSummary, SynthesisEngine};
use crate::transcription::{DiarizationClient, DiarizedTranscript, Diarizer, TranscriptionEngine};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

/// The main pipeline for session processing.
pub struct Pipeline {
    settings: Settings,
    tracker: StatusTracker,
    source: Arc<dyn SourceProvider>,
    transcription: TranscriptionEngine,
    synthesis: SynthesisEngine,
    cost: CostGuard,
    store: Arc<LocalObjectStore>,
}

impl Pipeline {
    /// Create a pipeline with default (HTTP) collaborators.
    pub fn new(settings: Settings, tracker: StatusTracker) -> Result<Self> {
        let source = Arc::new(HttpSourceProvider::new(
            &settings.source.base_url,
            settings.source.api_key.as_deref(),
            Duration::from_secs(settings.source.timeout_secs),
        )?);

        let diarizer = Arc::new(DiarizationClient::new(
            &settings.transcription.endpoint,
            settings.transcription.api_key.as_deref(),
            &settings.transcription.model,
            Duration::from_secs(settings.transcription.timeout_secs),
        )?);

        let ledger: Arc<dyn CreditLedger> = if settings.billing.enabled {
            Arc::new(HttpCreditLedger::new(&settings.billing.ledger_url)?)
        } else {
            Arc::new(NoopLedger)
        };

        Self::with_components(settings, tracker, source, diarizer, ledger)
    }

    /// Create a pipeline with custom collaborators.
    pub fn with_components(
        settings: Settings,
        tracker: StatusTracker,
        source: Arc<dyn SourceProvider>,
        diarizer: Arc<dyn Diarizer>,
        ledger: Arc<dyn CreditLedger>,
    ) -> Result<Self> {
        std::fs::create_dir_all(settings.temp_dir())?;
        std::fs::create_dir_all(settings.data_dir())?;

        let transcription = TranscriptionEngine::new(diarizer);
        let synthesis = SynthesisEngine::new(&settings.synthesis)?;
        let cost = CostGuard::new(ledger, settings.billing.clone());
        let store = Arc::new(LocalObjectStore::new(settings.data_dir()));

        Ok(Self {
            settings,
            tracker,
            source,
            transcription,
            synthesis,
            cost,
            store,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> Arc<LocalObjectStore> {
        self.store.clone()
    }

    pub fn tracker(&self) -> StatusTracker {
        self.tracker.clone()
    }

    /// Launch a job in the background. The caller must have claimed the
    /// key via `StatusTracker::start` first.
    pub fn spawn(self: Arc<Self>, key: JobKey) {
        tokio::spawn(async move {
            if let Err(e) = self.run_job(&key).await {
                error!("Job {} failed: {}", key, e);
            }
        });
    }

    /// Run a job to completion, recording the terminal outcome in the
    /// Status Tracker. Errors are also returned for foreground callers.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn run_job(&self, key: &JobKey) -> Result<()> {
        match self.execute(key).await {
            Ok(message) => {
                self.tracker.complete(key, &message).await;
                Ok(())
            }
            Err(e) => {
                self.tracker.fail(key, &e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn execute(&self, key: &JobKey) -> Result<String> {
        let owner = key.owner_id.as_str();
        let resource_id = key.resource_id.as_str();

        self.tracker.update(key, "Resolving session metadata", 2).await;
        let metadata = self.source.resolve(resource_id).await?;
        info!("Resolved session: {}", metadata.title);
        self.tracker.update(key, "Session resolved", 5).await;

        // Pre-flight credit gate before any expensive work.
        self.cost.precheck(owner).await?;
        self.tracker.update(key, "Credits verified", 8).await;

        // Scoped working directory: dropped (and deleted) on every exit
        // path, success or failure.
        let workdir = tempfile::tempdir_in(self.settings.temp_dir())?;

        self.tracker.update(key, "Downloading audio", 10).await;
        let progress = self.download_progress(key.clone());
        let asset = download::download_session(
            &self.settings.download,
            &metadata.manifest_url,
            workdir.path(),
            progress,
        )
        .await?;
        info!(
            "Downloaded {:.1}s of audio ({} bytes)",
            asset.duration_seconds, asset.byte_size
        );

        self.tracker.update(key, "Transcribing audio", 60).await;
        let transcript = self.transcription.transcribe(resource_id, &asset.path).await?;
        self.cost
            .charge(
                owner,
                &self.cost.transcription_cost(asset.duration_seconds),
                "transcription",
            )
            .await;
        self.tracker
            .update(key, "Transcription complete", 80)
            .await;

        self.tracker.update(key, "Synthesizing summary", 82).await;
        let summary = self.synthesis.synthesize(&transcript, &metadata).await?;
        self.cost
            .charge(
                owner,
                &self.cost.synthesis_cost(summary.tokens_used),
                "synthesis",
            )
            .await;
        self.tracker.update(key, "Summary complete", 92).await;

        self.tracker.update(key, "Persisting outputs", 95).await;
        self.persist(resource_id, &metadata, &transcript, &summary, &asset.path)
            .await?;

        Ok(format!(
            "Processed {:.1}s session with {} segments",
            asset.duration_seconds,
            transcript.segments.len()
        ))
    }

    /// Map download completion onto the 10-60% progress window.
    fn download_progress(&self, key: JobKey) -> ProgressFn {
        let tracker = self.tracker.clone();
        Arc::new(move |completed, total| {
            if total == 0 {
                return;
            }
            let pct = 10 + (completed * 50 / total) as u8;
            let tracker = tracker.clone();
            let key = key.clone();
            let message = format!("Downloading audio ({}/{})", completed, total);
            tokio::spawn(async move {
                tracker.update(&key, &message, pct).await;
            });
        })
    }

    async fn persist(
        &self,
        resource_id: &str,
        metadata: &SessionMetadata,
        transcript: &DiarizedTranscript,
        summary: &SessionSummary,
        audio_path: &std::path::Path,
    ) -> Result<()> {
        self.store.prepare_session(resource_id).await?;

        let metadata_json = serde_json::to_vec_pretty(metadata)?;
        self.store
            .put(&format!("{}/metadata.json", resource_id), &metadata_json)
            .await?;

        let structured = serde_json::to_vec_pretty(transcript)?;
        self.store
            .put(&format!("{}/transcript.json", resource_id), &structured)
            .await?;

        let display = transcript.format_display(|id| metadata.speaker_name(id));
        self.store
            .put(&format!("{}/transcript.txt", resource_id), display.as_bytes())
            .await?;

        let markdown = summary.render_markdown(&metadata.title);
        self.store
            .put(&format!("{}/summary.md", resource_id), markdown.as_bytes())
            .await?;

        self.store
            .put_file(&format!("{}/audio.mp3", resource_id), audio_path)
            .await?;

        info!("Persisted outputs for {}", resource_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OpptakError;
    use crate::status::JobState;
    use crate::transcription::WordToken;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SourceProvider for CountingSource {
        async fn resolve(&self, resource_id: &str) -> Result<SessionMetadata> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SessionMetadata {
                id: resource_id.to_string(),
                title: "Test session".to_string(),
                started_at: None,
                manifest_url: "http://127.0.0.1:1/playlist.m3u8".to_string(),
                participants: vec![],
            })
        }
    }

    struct CountingDiarizer {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Diarizer for CountingDiarizer {
        async fn diarize(&self, _audio_path: &std::path::Path) -> Result<Vec<WordToken>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    struct BrokeLedger;

    #[async_trait]
    impl CreditLedger for BrokeLedger {
        async fn check(&self, _owner: &str, _cost: f64) -> Result<bool> {
            Ok(false)
        }

        async fn deduct(&self, _owner: &str, _cost: f64, _reason: &str) -> Result<bool> {
            Ok(false)
        }
    }

    fn test_settings(dir: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.general.data_dir = dir.join("data").to_string_lossy().to_string();
        settings.general.temp_dir = dir.join("tmp").to_string_lossy().to_string();
        settings.billing.enabled = true;
        settings
    }

    #[tokio::test]
    async fn test_failed_precheck_stops_before_expensive_work() {
        let dir = tempfile::tempdir().unwrap();
        let source_calls = Arc::new(AtomicUsize::new(0));
        let diarizer_calls = Arc::new(AtomicUsize::new(0));

        let tracker = StatusTracker::new();
        let pipeline = Pipeline::with_components(
            test_settings(dir.path()),
            tracker.clone(),
            Arc::new(CountingSource {
                calls: source_calls.clone(),
            }),
            Arc::new(CountingDiarizer {
                calls: diarizer_calls.clone(),
            }),
            Arc::new(BrokeLedger),
        )
        .unwrap();

        let key = JobKey::new("owner-1", "session-1");
        tracker.start(&key).await;
        let result = pipeline.run_job(&key).await;

        assert!(matches!(result, Err(OpptakError::InsufficientCredits(_))));
        // Metadata resolution is cheap and allowed; no download or
        // transcription call was ever issued.
        assert_eq!(diarizer_calls.load(Ordering::SeqCst), 0);

        let status = tracker.get(&key).await;
        assert_eq!(status.state, JobState::Error);
        assert!(status.error.unwrap().contains("Insufficient credits"));
    }

    #[tokio::test]
    async fn test_late_progress_report_cannot_revive_terminal_job() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = StatusTracker::new();
        let pipeline = Pipeline::with_components(
            test_settings(dir.path()),
            tracker.clone(),
            Arc::new(CountingSource {
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Arc::new(CountingDiarizer {
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Arc::new(NoopLedger),
        )
        .unwrap();

        let key = JobKey::new("owner-1", "session-1");
        tracker.start(&key).await;
        let progress = pipeline.download_progress(key.clone());

        // The downloader's last callback can still be queued when the job
        // records its terminal outcome.
        tracker.fail(&key, "segment failure rate too high").await;
        progress(10, 10);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let status = tracker.get(&key).await;
        assert_eq!(status.state, JobState::Error);
        assert_eq!(
            status.error.as_deref(),
            Some("segment failure rate too high")
        );
        assert_ne!(status.message, "Downloading audio (10/10)");
    }

    #[tokio::test]
    async fn test_source_not_found_is_terminal_error_state() {
        struct MissingSource;

        #[async_trait]
        impl SourceProvider for MissingSource {
            async fn resolve(&self, resource_id: &str) -> Result<SessionMetadata> {
                Err(OpptakError::SourceNotFound(resource_id.to_string()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let tracker = StatusTracker::new();
        let pipeline = Pipeline::with_components(
            test_settings(dir.path()),
            tracker.clone(),
            Arc::new(MissingSource),
            Arc::new(CountingDiarizer {
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Arc::new(NoopLedger),
        )
        .unwrap();

        let key = JobKey::new("owner-1", "gone");
        tracker.start(&key).await;
        let result = pipeline.run_job(&key).await;

        assert!(matches!(result, Err(OpptakError::SourceNotFound(_))));
        let status = tracker.get(&key).await;
        assert_eq!(status.state, JobState::Error);
        // Pollers see the message field, never a stack trace
        assert!(status.error.unwrap().contains("gone"));
    }
}
