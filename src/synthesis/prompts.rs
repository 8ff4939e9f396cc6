//! Prompt templates for summary synthesis.
//!
//! Templates use `{{variable}}` placeholders rendered at call time.

use std::collections::HashMap;

pub const OVERVIEW_SYSTEM: &str = "You are an expert editorial assistant summarizing recorded \
audio sessions. Write clear, faithful prose. Never invent content that is not in the transcript.";

pub const OVERVIEW_USER: &str = "Participants:\n{{roster}}\n\nTranscript:\n{{transcript}}\n\n\
Write a single free-form narrative overview of this session: what it covered, who drove the \
conversation, and how it concluded. Plain prose, no headings or bullet points.";

pub const HIGHLIGHTS_SYSTEM: &str = "You are an expert editorial assistant distilling notable \
moments from recorded audio sessions.";

pub const HIGHLIGHTS_USER: &str = "Participants:\n{{roster}}\n\nTranscript segments:\n\
{{transcript}}\n\nDistill the most notable moments. Output one moment per line, and prefix \
every line with the segment's bracketed timestamp exactly as it appears, e.g. \
[03:12.40 - 03:58.10]. Output nothing but those lines.";

pub const QUOTES_SYSTEM: &str = "You are an expert editorial assistant extracting quotable \
lines from recorded audio sessions.";

pub const QUOTES_USER: &str = "Participants:\n{{roster}}\n\nTranscript segments:\n\
{{transcript}}\n\nExtract short, quotable lines worth sharing verbatim. Output one quote per \
line, and prefix every line with the segment's bracketed timestamp exactly as it appears, \
e.g. [03:12.40 - 03:58.10]. Output nothing but those lines.";

/// Render a template, replacing `{{key}}` with the given values.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{}}}}}", key), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_variables() {
        let mut vars = HashMap::new();
        vars.insert("roster".to_string(), "Ada (host)".to_string());
        vars.insert("transcript".to_string(), "[00:00.00] hi".to_string());

        let rendered = render(OVERVIEW_USER, &vars);
        assert!(rendered.contains("Ada (host)"));
        assert!(rendered.contains("[00:00.00] hi"));
        assert!(!rendered.contains("{{roster}}"));
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let vars = HashMap::new();
        let rendered = render("{{missing}}", &vars);
        assert_eq!(rendered, "{{missing}}");
    }
}
