//! HTTP diarization client.
//!
//! Uploads the finished asset as multipart form data and maps the JSON
//! word-token response into our models. One synchronous call per job, with
//! a generous timeout sized for multi-hour audio.

use super::models::WordToken;
use crate::error::{OpptakError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

/// A diarizing transcription service.
#[async_trait]
pub trait Diarizer: Send + Sync {
    /// Transcribe an audio file into speaker-attributed word tokens.
    async fn diarize(&self, audio_path: &Path) -> Result<Vec<WordToken>>;
}

/// Wire format of the diarization service response.
#[derive(Debug, Deserialize)]
struct DiarizeResponse {
    words: Vec<DiarizedWord>,
}

#[derive(Debug, Deserialize)]
struct DiarizedWord {
    word: String,
    speaker: u32,
    start: f64,
    end: f64,
}

/// Client for an HTTP diarization service.
pub struct DiarizationClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl DiarizationClient {
    pub fn new(
        endpoint: &str,
        api_key: Option<&str>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                OpptakError::TranscriptionFailed(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.map(|s| s.to_string()),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Diarizer for DiarizationClient {
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn diarize(&self, audio_path: &Path) -> Result<Vec<WordToken>> {
        let file_bytes = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        debug!("Uploading {} bytes for diarization", file_bytes.len());

        let part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| OpptakError::TranscriptionFailed(format!("Invalid upload part: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            OpptakError::TranscriptionFailed(format!("Diarization request failed: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(OpptakError::TranscriptionFailed(format!(
                "Diarization service returned {}",
                response.status()
            )));
        }

        let parsed: DiarizeResponse = response.json().await.map_err(|e| {
            OpptakError::TranscriptionFailed(format!("Invalid diarization response: {e}"))
        })?;

        let tokens: Vec<WordToken> = parsed
            .words
            .into_iter()
            .map(|w| WordToken {
                word: w.word,
                speaker_id: w.speaker,
                start: w.start,
                end: w.end,
            })
            .collect();

        debug!("Received {} word tokens", tokens.len());
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "words": [
                {"word": "hello", "speaker": 0, "start": 0.0, "end": 0.4},
                {"word": "there", "speaker": 1, "start": 0.4, "end": 0.9}
            ]
        }"#;
        let parsed: DiarizeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.words.len(), 2);
        assert_eq!(parsed.words[1].speaker, 1);
    }
}
