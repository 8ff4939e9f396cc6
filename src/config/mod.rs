//! Configuration management for Opptak.

mod settings;

pub use settings::{
    BillingSettings, DownloadSettings, DownloadStrategy, GeneralSettings, ServerSettings,
    Settings, SourceSettings, SynthesisSettings, TranscriptionSettings,
};
