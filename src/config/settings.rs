//! Configuration settings for Opptak.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub source: SourceSettings,
    pub download: DownloadSettings,
    pub transcription: TranscriptionSettings,
    pub synthesis: SynthesisSettings,
    pub billing: BillingSettings,
    pub server: ServerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for persisted session output.
    pub data_dir: String,
    /// Directory for temporary job workspaces.
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.opptak".to_string(),
            temp_dir: "/tmp/opptak".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Upstream session provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Base URL of the session metadata provider.
    pub base_url: String,
    /// Optional bearer token for the provider.
    pub api_key: Option<String>,
    /// Timeout for metadata/manifest fetches in seconds.
    pub timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Audio retrieval strategy.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStrategy {
    /// Sequential stream pull through ffmpeg with auto-reconnect.
    #[default]
    Stream,
    /// Parallel manifest-segment fetch and reassembly.
    Segments,
}

impl std::str::FromStr for DownloadStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stream" | "sequential" => Ok(DownloadStrategy::Stream),
            "segments" | "parallel" => Ok(DownloadStrategy::Segments),
            _ => Err(format!("Unknown download strategy: {}", s)),
        }
    }
}

impl std::fmt::Display for DownloadStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadStrategy::Stream => write!(f, "stream"),
            DownloadStrategy::Segments => write!(f, "segments"),
        }
    }
}

/// Audio download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Retrieval strategy (stream, segments).
    pub strategy: DownloadStrategy,
    /// Whole-download attempts for the stream strategy.
    pub max_attempts: u32,
    /// Base backoff delay for stream retries, in milliseconds.
    pub base_delay_ms: u64,
    /// Concurrent segment fetches for the segments strategy.
    pub concurrency: usize,
    /// Per-segment fetch attempts.
    pub segment_attempts: u32,
    /// Fixed delay between per-segment retries, in milliseconds.
    pub segment_delay_ms: u64,
    /// Per-segment fetch timeout in seconds.
    pub segment_timeout_secs: u64,
    /// Maximum tolerated fraction of failed segments before aborting.
    pub failure_rate_threshold: f64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            strategy: DownloadStrategy::Stream,
            max_attempts: 3,
            base_delay_ms: 1000,
            concurrency: 10,
            segment_attempts: 3,
            segment_delay_ms: 500,
            segment_timeout_secs: 30,
            failure_rate_threshold: 0.05,
        }
    }
}

/// Diarized transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Diarization service endpoint URL.
    pub endpoint: String,
    /// Optional API key for the diarization service.
    pub api_key: Option<String>,
    /// Model name passed to the service.
    pub model: String,
    /// Request timeout in seconds. Multi-hour audio takes minutes, not
    /// seconds, to transcribe.
    pub timeout_secs: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000/v1/diarize".to_string(),
            api_key: None,
            model: "diarize-general".to_string(),
            timeout_secs: 600,
        }
    }
}

/// AI synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    /// LLM model for overview/highlights/quotes generation.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion request timeout in seconds. Multi-hour transcripts make
    /// for long completions.
    pub timeout_secs: u64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            timeout_secs: 300,
        }
    }
}

/// Credit ledger and pricing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    /// Enable credit checks and deductions. When false a no-op ledger is
    /// used and every operation is allowed.
    pub enabled: bool,
    /// Base URL of the credit ledger service.
    pub ledger_url: String,
    /// Transcription price per minute of audio.
    pub transcription_per_minute: f64,
    /// Synthesis price per 1000 tokens.
    pub synthesis_per_1k_tokens: f64,
    /// Margin multiplier applied to base costs.
    pub margin: f64,
    /// Assumed transcript size (characters) for the pre-flight estimate.
    pub precheck_chars: u64,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ledger_url: "http://localhost:8081".to_string(),
            transcription_per_minute: 0.006,
            synthesis_per_1k_tokens: 0.002,
            margin: 1.2,
            precheck_chars: 60_000,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::OpptakError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("opptak")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.download.strategy, DownloadStrategy::Stream);
        assert_eq!(settings.download.concurrency, 10);
        assert!((settings.download.failure_rate_threshold - 0.05).abs() < f64::EPSILON);
        assert_eq!(settings.transcription.timeout_secs, 600);
        assert_eq!(settings.synthesis.timeout_secs, 300);
        assert!(!settings.billing.enabled);
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(
            "stream".parse::<DownloadStrategy>().unwrap(),
            DownloadStrategy::Stream
        );
        assert_eq!(
            "parallel".parse::<DownloadStrategy>().unwrap(),
            DownloadStrategy::Segments
        );
        assert!("carrier-pigeon".parse::<DownloadStrategy>().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
            [download]
            strategy = "segments"
            concurrency = 4
        "#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.download.strategy, DownloadStrategy::Segments);
        assert_eq!(settings.download.concurrency, 4);
        // Untouched sections keep their defaults
        assert_eq!(settings.download.segment_attempts, 3);
        assert_eq!(settings.server.port, 3000);
    }
}
