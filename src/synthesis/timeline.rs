//! Chronological merge of timestamped output lines.
//!
//! Highlights and quotes come back from independent completions, each line
//! prefixed with a bracketed `[start - end]` timestamp. Merging re-sorts
//! the combined list ascending by the start timestamp parsed out of each
//! line's bracket prefix; lines without a parsable timestamp sort as time
//! zero.

use regex::Regex;
use std::sync::OnceLock;

/// Matches a leading `[MM:SS…` bracket prefix. The seconds part may carry
/// a fractional component (`MM:SS.mm`); hours-long sessions produce large
/// minute values rather than an hour field.
fn bracket_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\[\s*(\d+):(\d{1,2}(?:\.\d+)?)").expect("Invalid regex")
    })
}

/// Parse the start timestamp (in seconds) from a line's bracket prefix.
/// Returns 0.0 when no timestamp can be parsed.
pub fn parse_bracket_start(line: &str) -> f64 {
    let Some(caps) = bracket_regex().captures(line) else {
        return 0.0;
    };

    let minutes: f64 = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0);
    let seconds: f64 = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0);

    minutes * 60.0 + seconds
}

/// Concatenate and chronologically re-interleave timestamped lines.
///
/// Empty lines are dropped. The sort is stable, so lines with equal
/// timestamps keep their input order (highlights before quotes).
pub fn merge_chronological(highlights: &str, quotes: &str) -> Vec<String> {
    let mut lines: Vec<String> = highlights
        .lines()
        .chain(quotes.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    lines.sort_by(|a, b| {
        parse_bracket_start(a)
            .partial_cmp(&parse_bracket_start(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bracket_start() {
        assert_eq!(parse_bracket_start("[01:00 - 01:05] moment"), 60.0);
        assert_eq!(parse_bracket_start("[00:10 - 00:12] quote"), 10.0);
        assert_eq!(parse_bracket_start("[03:12.40 - 03:58.10] detail"), 192.4);
        assert_eq!(parse_bracket_start("  [12:05.50] indented"), 725.5);
    }

    #[test]
    fn test_unparsable_lines_sort_as_zero() {
        assert_eq!(parse_bracket_start("no timestamp here"), 0.0);
        assert_eq!(parse_bracket_start("[broken"), 0.0);

        let merged = merge_chronological("[01:00 - 01:05] late", "stray line");
        assert_eq!(merged[0], "stray line");
        assert_eq!(merged[1], "[01:00 - 01:05] late");
    }

    #[test]
    fn test_merge_interleaves_chronologically() {
        let highlights = "[01:00 - 01:05] the big reveal";
        let quotes = "[00:10 - 00:12] \"we should ship it\"";

        let merged = merge_chronological(highlights, quotes);

        assert_eq!(merged.len(), 2);
        assert!(merged[0].starts_with("[00:10"));
        assert!(merged[1].starts_with("[01:00"));
    }

    #[test]
    fn test_merge_drops_empty_lines() {
        let merged = merge_chronological("[00:05 - 00:06] a\n\n", "\n[00:01 - 00:02] b\n");
        assert_eq!(merged.len(), 2);
        assert!(merged[0].starts_with("[00:01"));
    }

    #[test]
    fn test_merge_is_stable_for_equal_timestamps() {
        let merged = merge_chronological("[00:10 - 00:20] highlight", "[00:10 - 00:11] quote");
        assert!(merged[0].contains("highlight"));
        assert!(merged[1].contains("quote"));
    }
}
