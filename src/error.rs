//! Error types for Opptak.

use thiserror::Error;

/// Library-level error type for Opptak operations.
#[derive(Error, Debug)]
pub enum OpptakError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Audio download failed: {0}")]
    DownloadFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Insufficient credits: {0}")]
    InsufficientCredits(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Billing error: {0}")]
    Billing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Opptak operations.
pub type Result<T> = std::result::Result<T, OpptakError>;
