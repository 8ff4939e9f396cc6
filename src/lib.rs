//! Opptak - Audio Session Ingestion and Streaming
//!
//! A server and CLI for ingesting recorded audio sessions from a remote
//! source, transcribing them with speaker attribution, synthesizing a
//! structured summary, and serving the audio back with byte-range support.
//!
//! The name "Opptak" comes from the Norwegian word for "recording."
//!
//! # Overview
//!
//! Opptak allows you to:
//! - Pull a recorded session from an upstream provider (sequential stream
//!   pull or parallel segment fetch)
//! - Transcribe it with speaker diarization
//! - Generate an overview, highlights, and quotes with AI completions
//! - Stream the finished audio with HTTP Range support
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `status` - Concurrency-safe job status tracking
//! - `source` - Upstream session metadata/manifest resolution
//! - `download` - Audio retrieval strategies and reassembly
//! - `transcription` - Diarized speech-to-text
//! - `synthesis` - AI summary generation and chronological merge
//! - `billing` - Credit estimation, pre-checks, and deductions
//! - `storage` - Durable object store and persisted session layout
//! - `pipeline` - Per-job orchestration
//! - `server` - HTTP API and audio delivery
//!
//! # Example
//!
//! ```rust,no_run
//! use opptak::config::Settings;
//! use opptak::pipeline::Pipeline;
//! use opptak::status::{JobKey, StatusTracker};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let tracker = StatusTracker::new();
//!     let pipeline = Arc::new(Pipeline::new(settings, tracker.clone())?);
//!
//!     let key = JobKey::new("local", "session-42");
//!     if tracker.start(&key).await {
//!         pipeline.run_job(&key).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod billing;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod server;
pub mod source;
pub mod status;
pub mod storage;
pub mod synthesis;
pub mod transcription;

pub use error::{OpptakError, Result};
