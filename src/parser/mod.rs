pub mod classify;
pub mod normalize;
pub mod package;
pub mod structure;

use chrono::{DateTime, Utc};
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::page::Page;
use classify::ClassificationResult;
use package::ExtractionPayload;
use structure::StructureCounts;

/// Classification plus the page identity as displayed (original casing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAnalysis {
    #[serde(flatten)]
    pub classification: ClassificationResult,
    pub page_title: String,
    pub page_url: String,
}

/// Normalized text plus the structure counts of the stripped document.
struct CleanPage {
    text: String,
    structure: StructureCounts,
}

fn clean(page: &Page) -> CleanPage {
    let mut doc = Html::parse_document(&page.html);
    let text = normalize::normalize(&mut doc);
    // counted after stripping so navigation lists don't count
    let structure = StructureCounts::from_document(&doc);
    CleanPage { text, structure }
}

/// Normalize → classify.
pub fn analyze_page(page: &Page) -> PageAnalysis {
    analyze_cleaned(page, &clean(page))
}

/// Normalize → classify → package, parsing the page once. The analysis is
/// returned alongside the payload for display.
pub fn extract_page(
    page: &Page,
    max_chars: usize,
    now: DateTime<Utc>,
) -> (PageAnalysis, ExtractionPayload) {
    let cleaned = clean(page);
    let analysis = analyze_cleaned(page, &cleaned);
    let payload = package::package(
        &cleaned.text,
        analysis.classification.clone(),
        &page.title,
        &page.url,
        now,
        max_chars,
    );
    (analysis, payload)
}

fn analyze_cleaned(page: &Page, cleaned: &CleanPage) -> PageAnalysis {
    let classification =
        classify::classify(&page.url, &page.title, &cleaned.text, &cleaned.structure);
    info!(
        url = %page.url,
        confidence = classification.confidence,
        detected = classification.is_legal_document,
        document_type = %classification.document_type,
        "Analyzed page"
    );
    PageAnalysis {
        classification,
        page_title: page.title.clone(),
        page_url: page.url.clone(),
    }
}
