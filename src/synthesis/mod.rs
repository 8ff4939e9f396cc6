//! AI summary synthesis.
//!
//! Issues three independent completions over the diarized transcript
//! (overview, highlights, quotes), then merges highlight and quote lines
//! chronologically. The completions share no data dependency, so they run
//! concurrently.

mod prompts;
pub mod timeline;

use crate::config::SynthesisSettings;
use crate::error::{OpptakError, Result};
use crate::source::SessionMetadata;
use crate::transcription::DiarizedTranscript;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Minimum word count for a segment to be offered as highlight material.
const HIGHLIGHT_MIN_WORDS: usize = 9;

/// The synthesized summary of a session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Free-form narrative overview.
    pub overview: String,
    /// Highlights and quotes, merged ascending by bracket timestamp.
    pub moments: Vec<String>,
    /// Total completion + prompt tokens across all three calls.
    pub tokens_used: u64,
}

impl SessionSummary {
    /// Render the summary as Markdown for `summary.md`.
    pub fn render_markdown(&self, title: &str) -> String {
        let mut out = format!("# {}\n\n## Overview\n\n{}\n", title, self.overview.trim());

        if !self.moments.is_empty() {
            out.push_str("\n## Moments\n\n");
            for moment in &self.moments {
                out.push_str(&format!("- {}\n", moment));
            }
        }

        out
    }
}

/// Engine for multi-call summary synthesis.
pub struct SynthesisEngine {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl SynthesisEngine {
    /// Build the engine and its OpenAI client, with the request timeout
    /// taken from settings.
    pub fn new(settings: &SynthesisSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| OpptakError::Synthesis(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Client::with_config(OpenAIConfig::default()).with_http_client(http_client),
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    /// Generate overview, highlights, and quotes concurrently and merge
    /// the latter two chronologically.
    #[instrument(skip_all, fields(resource_id = %transcript.resource_id))]
    pub async fn synthesize(
        &self,
        transcript: &DiarizedTranscript,
        metadata: &SessionMetadata,
    ) -> Result<SessionSummary> {
        let roster = format_roster(metadata);
        let full = transcript.format_display(|id| metadata.speaker_name(id));
        let substantial = format_substantial_segments(transcript, metadata);

        let overview_vars = vars(&roster, &full);
        let highlight_vars = vars(&roster, &substantial);
        let quote_vars = vars(&roster, &full);

        info!("Issuing 3 synthesis completions with {}", self.model);

        let (overview, highlights, quotes) = tokio::try_join!(
            self.complete(prompts::OVERVIEW_SYSTEM, prompts::OVERVIEW_USER, &overview_vars),
            self.complete(
                prompts::HIGHLIGHTS_SYSTEM,
                prompts::HIGHLIGHTS_USER,
                &highlight_vars
            ),
            self.complete(prompts::QUOTES_SYSTEM, prompts::QUOTES_USER, &quote_vars),
        )?;

        let moments = timeline::merge_chronological(&highlights.text, &quotes.text);
        let tokens_used = overview.tokens + highlights.tokens + quotes.tokens;

        debug!(
            "Synthesis complete: {} moments, {} tokens",
            moments.len(),
            tokens_used
        );

        Ok(SessionSummary {
            overview: overview.text,
            moments,
            tokens_used,
        })
    }

    /// One chat completion, returning text plus token usage for billing.
    async fn complete(
        &self,
        system: &str,
        user_template: &str,
        vars: &HashMap<String, String>,
    ) -> Result<Completion> {
        let user_prompt = prompts::render(user_template, vars);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| OpptakError::Synthesis(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| OpptakError::Synthesis(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| OpptakError::Synthesis(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| OpptakError::OpenAI(format!("Completion failed: {}", e)))?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| OpptakError::Synthesis("Empty response from LLM".to_string()))?
            .clone();

        let tokens = response
            .usage
            .map(|u| u.total_tokens as u64)
            .unwrap_or(0);

        Ok(Completion { text, tokens })
    }
}

struct Completion {
    text: String,
    tokens: u64,
}

fn vars(roster: &str, transcript: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("roster".to_string(), roster.to_string());
    map.insert("transcript".to_string(), transcript.to_string());
    map
}

/// Roster lines: "Name (host)" / "Name (speaker)".
fn format_roster(metadata: &SessionMetadata) -> String {
    if metadata.participants.is_empty() {
        return "(unknown participants)".to_string();
    }

    metadata
        .participants
        .iter()
        .map(|p| {
            let role = match p.role {
                crate::source::ParticipantRole::Host => "host",
                crate::source::ParticipantRole::Speaker => "speaker",
            };
            format!("{} ({})", p.name, role)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Display rendering restricted to substantial (>8-word) segments, the
/// only ones offered as highlight material.
fn format_substantial_segments(
    transcript: &DiarizedTranscript,
    metadata: &SessionMetadata,
) -> String {
    let substantial: Vec<_> = transcript
        .segments
        .iter()
        .filter(|s| s.text.split_whitespace().count() >= HIGHLIGHT_MIN_WORDS)
        .cloned()
        .collect();

    let filtered = DiarizedTranscript::new(transcript.resource_id.clone(), substantial);
    filtered.format_display(|id| metadata.speaker_name(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Participant, ParticipantRole};
    use crate::transcription::{build_segments, WordToken};

    fn metadata() -> SessionMetadata {
        SessionMetadata {
            id: "s1".to_string(),
            title: "Planning".to_string(),
            started_at: None,
            manifest_url: String::new(),
            participants: vec![Participant {
                name: "Ada".to_string(),
                role: ParticipantRole::Host,
            }],
        }
    }

    fn transcript_with(texts: &[(&str, f64)]) -> DiarizedTranscript {
        let mut tokens = Vec::new();
        for (i, (text, start)) in texts.iter().enumerate() {
            for (j, word) in text.split_whitespace().enumerate() {
                tokens.push(WordToken {
                    word: word.to_string(),
                    speaker_id: i as u32,
                    start: start + j as f64 * 0.1,
                    end: start + (j + 1) as f64 * 0.1,
                });
            }
        }
        DiarizedTranscript::new("s1".to_string(), build_segments(&tokens))
    }

    #[test]
    fn test_roster_formatting() {
        assert_eq!(format_roster(&metadata()), "Ada (host)");
    }

    #[test]
    fn test_engine_builds_from_settings() {
        let engine = SynthesisEngine::new(&SynthesisSettings::default()).unwrap();
        assert_eq!(engine.model, "gpt-4o-mini");
    }

    #[test]
    fn test_substantial_filter_drops_short_segments() {
        let transcript = transcript_with(&[
            ("yes", 0.0),
            (
                "this is a much longer segment with well over eight words in it",
                10.0,
            ),
        ]);
        let rendered = format_substantial_segments(&transcript, &metadata());

        assert!(!rendered.contains("] Ada: yes"));
        assert!(rendered.contains("much longer segment"));
        assert_eq!(rendered.lines().count(), 1);
    }

    #[test]
    fn test_summary_markdown() {
        let summary = SessionSummary {
            overview: "A short session.".to_string(),
            moments: vec!["[00:10 - 00:12] the quote".to_string()],
            tokens_used: 123,
        };
        let md = summary.render_markdown("Planning");

        assert!(md.starts_with("# Planning\n"));
        assert!(md.contains("## Overview"));
        assert!(md.contains("- [00:10 - 00:12] the quote"));
    }
}
