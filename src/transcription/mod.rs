//! Diarized speech-to-text transcription.

mod models;
mod service;

pub use models::{build_segments, format_clock, DiarizedTranscript, SpeakerSegment, WordToken};
pub use service::{DiarizationClient, Diarizer};

use crate::error::{OpptakError, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Turns a finished audio asset into a diarized transcript.
pub struct TranscriptionEngine {
    diarizer: Arc<dyn Diarizer>,
}

impl TranscriptionEngine {
    pub fn new(diarizer: Arc<dyn Diarizer>) -> Self {
        Self { diarizer }
    }

    /// Transcribe an asset and merge word tokens into speaker segments.
    ///
    /// No usable segments is terminal for the job.
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    pub async fn transcribe(
        &self,
        resource_id: &str,
        audio_path: &Path,
    ) -> Result<DiarizedTranscript> {
        let tokens = self.diarizer.diarize(audio_path).await?;
        let segments = build_segments(&tokens);

        if segments.is_empty() {
            return Err(OpptakError::TranscriptionFailed(
                "Diarization returned no usable segments".into(),
            ));
        }

        info!(
            "Built {} speaker segments from {} tokens",
            segments.len(),
            tokens.len()
        );
        Ok(DiarizedTranscript::new(resource_id.to_string(), segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticDiarizer(Vec<WordToken>);

    #[async_trait]
    impl Diarizer for StaticDiarizer {
        async fn diarize(&self, _audio_path: &Path) -> Result<Vec<WordToken>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_empty_tokens_is_transcription_failure() {
        let engine = TranscriptionEngine::new(Arc::new(StaticDiarizer(vec![])));
        let result = engine.transcribe("s1", Path::new("/tmp/a.mp3")).await;
        assert!(matches!(result, Err(OpptakError::TranscriptionFailed(_))));
    }

    #[tokio::test]
    async fn test_tokens_become_segments() {
        let tokens = vec![
            WordToken {
                word: "good".into(),
                speaker_id: 0,
                start: 0.0,
                end: 0.5,
            },
            WordToken {
                word: "morning".into(),
                speaker_id: 0,
                start: 0.5,
                end: 1.0,
            },
            WordToken {
                word: "hi".into(),
                speaker_id: 1,
                start: 1.0,
                end: 1.2,
            },
        ];
        let engine = TranscriptionEngine::new(Arc::new(StaticDiarizer(tokens)));
        let transcript = engine.transcribe("s1", Path::new("/tmp/a.mp3")).await.unwrap();

        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[0].text, "good morning");
        assert_eq!(transcript.full_text, "good morning hi");
    }
}
