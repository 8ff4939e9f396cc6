//! Concurrency-safe job status tracking.
//!
//! Jobs are keyed by `(owner, resource)`. The owning background task is the
//! only writer for a key; arbitrary poller threads read. At most one job may
//! be `processing` per key, enforced by a compare-and-swap in [`StatusTracker::start`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Identifies at most one concurrently active processing run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub owner_id: String,
    pub resource_id: String,
}

impl JobKey {
    pub fn new(owner_id: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            resource_id: resource_id.into(),
        }
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.resource_id)
    }
}

/// Lifecycle state of a processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    NotStarted,
    Processing,
    Completed,
    Error,
}

/// Pollable view of a job. Never deleted; overwritten by the next run for
/// the same key.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub state: JobState,
    pub message: String,
    /// Completion percentage in [0, 100].
    pub progress: u8,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self {
            state: JobState::NotStarted,
            message: String::new(),
            progress: 0,
            error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Process-wide keyed store of job state.
///
/// Clones share the same underlying map, so one tracker can be handed to
/// the HTTP server and every job task.
#[derive(Clone, Default)]
pub struct StatusTracker {
    jobs: Arc<RwLock<HashMap<JobKey, JobStatus>>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim a key for a new run.
    ///
    /// Returns false if a job for this key is already `processing`;
    /// otherwise the key transitions to `processing` atomically under the
    /// write lock and true is returned.
    pub async fn start(&self, key: &JobKey) -> bool {
        let mut jobs = self.jobs.write().await;

        if let Some(existing) = jobs.get(key) {
            if existing.state == JobState::Processing {
                return false;
            }
        }

        jobs.insert(
            key.clone(),
            JobStatus {
                state: JobState::Processing,
                message: "Starting".to_string(),
                progress: 0,
                error: None,
                updated_at: Utc::now(),
            },
        );
        true
    }

    /// Report progress for an active job.
    ///
    /// Only a key currently in `processing` accepts progress writes. A
    /// late report racing a terminal transition is dropped, so `completed`
    /// and `error` stay stable until the next `start`.
    pub async fn update(&self, key: &JobKey, message: &str, progress: u8) {
        let mut jobs = self.jobs.write().await;
        if let Some(existing) = jobs.get_mut(key) {
            if existing.state != JobState::Processing {
                return;
            }
            *existing = JobStatus {
                state: JobState::Processing,
                message: message.to_string(),
                progress: progress.min(100),
                error: None,
                updated_at: Utc::now(),
            };
        }
    }

    /// Mark a job completed. Terminal until the next `start`.
    pub async fn complete(&self, key: &JobKey, message: &str) {
        let mut jobs = self.jobs.write().await;
        jobs.insert(
            key.clone(),
            JobStatus {
                state: JobState::Completed,
                message: message.to_string(),
                progress: 100,
                error: None,
                updated_at: Utc::now(),
            },
        );
    }

    /// Mark a job failed with a human-readable message. Terminal until the
    /// next `start`.
    pub async fn fail(&self, key: &JobKey, error: &str) {
        let mut jobs = self.jobs.write().await;
        let progress = jobs.get(key).map(|j| j.progress).unwrap_or(0);
        jobs.insert(
            key.clone(),
            JobStatus {
                state: JobState::Error,
                message: "Processing failed".to_string(),
                progress,
                error: Some(error.to_string()),
                updated_at: Utc::now(),
            },
        );
    }

    /// Current view of a job. Unknown keys yield a default `not_started`
    /// view rather than an error.
    pub async fn get(&self, key: &JobKey) -> JobStatus {
        let jobs = self.jobs.read().await;
        jobs.get(key).cloned().unwrap_or_default()
    }
}
