use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::classify::ClassificationResult;
use super::normalize::normalize_whitespace;

pub const DEFAULT_MAX_CONTENT_CHARS: usize = 15_000;
pub const TRUNCATION_MARKER: &str = "...";

/// Everything the request layer needs for one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPayload {
    pub content: String,
    pub title: String,
    pub url: String,
    pub extracted_at: String,
    pub analysis: ClassificationResult,
}

pub fn package(
    raw_text: &str,
    analysis: ClassificationResult,
    title: &str,
    url: &str,
    now: DateTime<Utc>,
    max_chars: usize,
) -> ExtractionPayload {
    let content = truncate_content(&normalize_whitespace(raw_text), max_chars);
    ExtractionPayload {
        content,
        title: title.to_string(),
        url: url.to_string(),
        extracted_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        analysis,
    }
}

/// Hard cut at `max_chars` characters plus the marker. Content at or under
/// the limit is returned as is.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &content[..cut], TRUNCATION_MARKER),
        None => content.to_string(),
    }
}
