//! Model output normalisation.
//!
//! The models are told not to fence their JSON or title their summaries, but
//! they sometimes do anyway. These helpers undo that.

use once_cell::sync::Lazy;
use regex::Regex;

/// Markdown heading lines (`#` through `######`), anywhere in the text.
static HEADING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^#{1,6}(?:[ \t]+.*)?(?:\n|$)").expect("Invalid heading regex")
});

/// A leading line that is only an "Executive Summary" title, optionally bold.
static TITLE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\A[ \t]*(?:\*\*)?executive summary(?:\*\*)?[ \t]*:?[ \t]*(?:\*\*)?[ \t]*(?:\n|\z)")
        .expect("Invalid title regex")
});

/// A leading "Executive Summary:" label followed by prose on the same line.
static TITLE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\A[ \t]*(?:\*\*)?executive summary(?:\*\*)?[ \t]*:(?:\*\*)?[ \t]*")
        .expect("Invalid title prefix regex")
});

/// Three or more line breaks, allowing whitespace-only lines in between.
static BLANK_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").expect("Invalid blank run regex"));

/// Remove a surrounding markdown code fence (```` ```json ```` or bare ```` ``` ````).
pub fn strip_code_fence(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Drop the info string ("json", "JSON", ...) up to the first newline.
        s = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

fn clean_pass(text: &str) -> String {
    let text = HEADING_LINE.replace_all(text, "");
    let text = text.trim_start();
    let text = TITLE_LINE.replace(text, "");
    let text = TITLE_PREFIX.replace(&text, "");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Normalise a model-written summary into plain paragraphs.
///
/// Strips heading lines and a leading "Executive Summary" title, collapses
/// runs of blank lines to a single blank line, and trims. Passes repeat
/// until nothing changes, so `clean_summary(clean_summary(s)) == clean_summary(s)`.
pub fn clean_summary(raw: &str) -> String {
    let mut current = clean_pass(&raw.replace("\r\n", "\n"));
    loop {
        let next = clean_pass(&current);
        // Every pass only deletes, so this terminates.
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Split a cleaned summary into its paragraphs.
pub fn paragraphs(summary: &str) -> Vec<&str> {
    summary
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// First paragraph of a summary, used as the email preview.
pub fn first_paragraph(summary: &str) -> String {
    let cleaned = clean_summary(summary);
    paragraphs(&cleaned)
        .first()
        .map(|p| p.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_and_blank_runs() {
        let raw = "## Executive Summary\n\nParagraph one.\n\n\n\nParagraph two.";
        assert_eq!(clean_summary(raw), "Paragraph one.\n\nParagraph two.");
    }

    #[test]
    fn test_title_line_without_heading() {
        let raw = "Executive Summary:\nAcme sells boots.\n\nThey want growth.";
        assert_eq!(clean_summary(raw), "Acme sells boots.\n\nThey want growth.");
    }

    #[test]
    fn test_bold_title_line() {
        let raw = "**Executive Summary**\n\nAcme sells boots.";
        assert_eq!(clean_summary(raw), "Acme sells boots.");
    }

    #[test]
    fn test_title_prefix_keeps_same_line_prose() {
        let raw = "Executive Summary: Acme sells boots.\n\nThey want growth.";
        assert_eq!(clean_summary(raw), "Acme sells boots.\n\nThey want growth.");
    }

    #[test]
    fn test_body_mention_is_kept() {
        let raw = "Acme sells boots.\n\nExecutive summary findings point to retail.";
        assert_eq!(clean_summary(raw), raw);
    }

    #[test]
    fn test_hashtag_is_not_a_heading() {
        let raw = "#boots are the focus.";
        assert_eq!(clean_summary(raw), raw);
    }

    #[test]
    fn test_crlf_and_whitespace_lines() {
        let raw = "One.\r\n\r\n  \r\n\r\nTwo.";
        assert_eq!(clean_summary(raw), "One.\n\nTwo.");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "## Executive Summary\n\nParagraph one.\n\n\n\nParagraph two.",
            "Executive Summary\nExecutive Summary\nBody.",
            "# Title\n## Sub\n\n\nText\n\n\n\n### Tail",
            "   plain text   ",
            "",
        ];
        for raw in inputs {
            let once = clean_summary(raw);
            assert_eq!(clean_summary(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_first_paragraph() {
        let raw = "## Executive Summary\n\nParagraph one.\n\n\n\nParagraph two.";
        assert_eq!(first_paragraph(raw), "Paragraph one.");
        assert_eq!(first_paragraph(""), "");
    }

    #[test]
    fn test_strip_code_fence_json() {
        assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fence("```\n[]\n```\n"), "[]");
        assert_eq!(strip_code_fence("```json [] ```"), "[]");
    }

    #[test]
    fn test_strip_code_fence_passthrough() {
        assert_eq!(strip_code_fence("  [{\"a\": 1}]  "), "[{\"a\": 1}]");
    }
}
