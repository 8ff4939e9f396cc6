//! Data models for diarized transcription.

use serde::{Deserialize, Serialize};

/// A single word with speaker attribution and precise timing, as returned
/// by the diarization service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordToken {
    /// The word text.
    pub word: String,
    /// Speaker identifier assigned by diarization.
    pub speaker_id: u32,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
}

/// A contiguous run of words from one speaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerSegment {
    pub speaker_id: u32,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    pub text: String,
}

/// A complete diarized transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiarizedTranscript {
    /// Resource ID this transcript belongs to.
    pub resource_id: String,
    /// Speaker segments, monotonically non-decreasing in start time.
    pub segments: Vec<SpeakerSegment>,
    /// Full transcript text (concatenated segments).
    pub full_text: String,
    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl DiarizedTranscript {
    /// Create a transcript from segments.
    pub fn new(resource_id: String, segments: Vec<SpeakerSegment>) -> Self {
        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let duration_seconds = segments.last().map(|s| s.end).unwrap_or(0.0);

        Self {
            resource_id,
            segments,
            full_text,
            duration_seconds,
        }
    }

    /// Display rendering: one line per segment, bracketed `MM:SS.mm`
    /// timestamps and speaker names. The machine-oriented structured form
    /// is the serialized transcript itself (speaker ids and raw-second
    /// timings), persisted as `transcript.json`.
    pub fn format_display(&self, speaker_name: impl Fn(u32) -> String) -> String {
        self.segments
            .iter()
            .map(|s| {
                format!(
                    "[{} - {}] {}: {}",
                    format_clock(s.start),
                    format_clock(s.end),
                    speaker_name(s.speaker_id),
                    s.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Merge contiguous same-speaker tokens into segments.
///
/// While the speaker is unchanged the current segment absorbs the token
/// and extends its end; any speaker change closes the segment and opens a
/// new one.
pub fn build_segments(tokens: &[WordToken]) -> Vec<SpeakerSegment> {
    let mut segments: Vec<SpeakerSegment> = Vec::new();

    for token in tokens {
        match segments.last_mut() {
            Some(current) if current.speaker_id == token.speaker_id => {
                current.end = token.end;
                if !current.text.is_empty() {
                    current.text.push(' ');
                }
                current.text.push_str(token.word.trim());
            }
            _ => {
                segments.push(SpeakerSegment {
                    speaker_id: token.speaker_id,
                    start: token.start,
                    end: token.end,
                    text: token.word.trim().to_string(),
                });
            }
        }
    }

    segments
}

/// Format seconds as `MM:SS.mm` (minutes, seconds, centiseconds).
pub fn format_clock(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let minutes = total_cs / 6000;
    let secs = (total_cs % 6000) / 100;
    let centis = total_cs % 100;
    format!("{:02}:{:02}.{:02}", minutes, secs, centis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(speaker_id: u32, start: f64, end: f64, word: &str) -> WordToken {
        WordToken {
            word: word.to_string(),
            speaker_id,
            start,
            end,
        }
    }

    #[test]
    fn test_build_segments_merges_contiguous_speakers() {
        let tokens = vec![
            token(0, 0.0, 1.0, "hello"),
            token(0, 1.0, 2.0, "there"),
            token(1, 2.0, 3.0, "hi"),
            token(0, 3.0, 4.0, "welcome"),
        ];

        let segments = build_segments(&tokens);

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].speaker_id, 0);
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 2.0);
        assert_eq!(segments[0].text, "hello there");
        assert_eq!(segments[1].speaker_id, 1);
        assert_eq!(segments[1].start, 2.0);
        assert_eq!(segments[1].end, 3.0);
        assert_eq!(segments[2].speaker_id, 0);
        assert_eq!(segments[2].start, 3.0);
        assert_eq!(segments[2].end, 4.0);
    }

    #[test]
    fn test_build_segments_empty() {
        assert!(build_segments(&[]).is_empty());
    }

    #[test]
    fn test_segments_monotonic_start() {
        let tokens = vec![
            token(0, 0.0, 1.5, "a"),
            token(1, 1.5, 2.0, "b"),
            token(2, 2.0, 5.0, "c"),
            token(1, 5.0, 6.0, "d"),
        ];
        let segments = build_segments(&tokens);
        for pair in segments.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00.00");
        assert_eq!(format_clock(65.25), "01:05.25");
        assert_eq!(format_clock(72.5), "01:12.50");
        assert_eq!(format_clock(600.0), "10:00.00");
    }

    #[test]
    fn test_transcript_derivations() {
        let segments = build_segments(&[
            token(0, 0.0, 1.0, "hello"),
            token(1, 1.0, 2.5, "world"),
        ]);
        let transcript = DiarizedTranscript::new("s1".to_string(), segments);

        assert_eq!(transcript.full_text, "hello world");
        assert_eq!(transcript.duration_seconds, 2.5);
    }

    #[test]
    fn test_structured_form_serializes_raw_timings() {
        let segments = build_segments(&[token(2, 12.4, 58.1, "ship it")]);
        let transcript = DiarizedTranscript::new("s1".to_string(), segments);

        let json = serde_json::to_value(&transcript).unwrap();
        assert_eq!(json["segments"][0]["speaker_id"], 2);
        assert_eq!(json["segments"][0]["start"], 12.4);
        assert_eq!(json["segments"][0]["end"], 58.1);
        assert_eq!(json["segments"][0]["text"], "ship it");
    }

    #[test]
    fn test_format_display() {
        let segments = build_segments(&[token(0, 0.0, 1.0, "hello")]);
        let transcript = DiarizedTranscript::new("s1".to_string(), segments);

        let display = transcript.format_display(|id| format!("Speaker {}", id + 1));
        assert_eq!(display, "[00:00.00 - 00:01.00] Speaker 1: hello");
    }
}
