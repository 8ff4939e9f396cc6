//! Upstream session resolution.
//!
//! Resolves an external resource identifier into session metadata plus a
//! manifest URL for the audio itself.

use crate::error::{OpptakError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Role of a session participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Host,
    Speaker,
}

/// A named participant in a recorded session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub role: ParticipantRole,
}

/// Metadata for a recorded session, as reported by the upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub id: String,
    pub title: String,
    pub started_at: Option<DateTime<Utc>>,
    /// Playlist/manifest URL describing the session audio.
    pub manifest_url: String,
    pub participants: Vec<Participant>,
}

impl SessionMetadata {
    /// Display name for a diarization speaker id, mapped onto the roster
    /// (hosts first). Ids beyond the roster render as "Speaker N".
    pub fn speaker_name(&self, speaker_id: u32) -> String {
        self.participants
            .get(speaker_id as usize)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("Speaker {}", speaker_id + 1))
    }
}

/// A provider of session metadata and manifests.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Resolve a resource identifier to its session metadata.
    ///
    /// A missing resource is terminal: `SourceNotFound`, never retried.
    async fn resolve(&self, resource_id: &str) -> Result<SessionMetadata>;
}

/// HTTP implementation against the upstream provider's REST API.
pub struct HttpSourceProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSourceProvider {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OpptakError::Source(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(|s| s.to_string()),
        })
    }
}

#[async_trait]
impl SourceProvider for HttpSourceProvider {
    async fn resolve(&self, resource_id: &str) -> Result<SessionMetadata> {
        let url = format!("{}/sessions/{}", self.base_url, resource_id);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OpptakError::Source(format!("Provider request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(OpptakError::SourceNotFound(resource_id.to_string()));
        }

        if !response.status().is_success() {
            return Err(OpptakError::Source(format!(
                "Provider returned {} for {}",
                response.status(),
                resource_id
            )));
        }

        let metadata: SessionMetadata = response
            .json()
            .await
            .map_err(|e| OpptakError::Source(format!("Invalid provider response: {}", e)))?;

        Ok(metadata)
    }
}
