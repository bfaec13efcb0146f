use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::parser::classify::ClassificationResult;
use crate::parser::PageAnalysis;

/// Model output for one page, with the detection context it was run under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub page_title: String,
    pub page_url: String,
    pub document_type: String,
    pub confidence: u32,
    pub body: String,
    pub created_at: String,
}

/// Headline and confidence line shown for a page.
pub fn status_lines(analysis: &PageAnalysis) -> (String, String) {
    let c = &analysis.classification;
    if c.is_legal_document {
        (
            format!("{} detected", c.document_type),
            format!("Confidence: {}% ({})", c.confidence, c.reasons.join(", ")),
        )
    } else {
        (
            "No legal document detected".to_string(),
            format!(
                "Confidence: {}% - This doesn't appear to be a legal document",
                c.confidence
            ),
        )
    }
}

/// Whether the analyze action is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeGate {
    NeedsApiKey,
    NotLegal,
    Ready,
}

impl AnalyzeGate {
    pub fn label(self) -> &'static str {
        match self {
            AnalyzeGate::NeedsApiKey => "Enter API Key to Continue",
            AnalyzeGate::NotLegal => "No Legal Document Detected",
            AnalyzeGate::Ready => "Analyze This Page",
        }
    }
}

pub fn analyze_gate(api_key: Option<&str>, classification: &ClassificationResult) -> AnalyzeGate {
    let has_key = api_key.is_some_and(|k| !k.trim().is_empty());
    if !has_key {
        AnalyzeGate::NeedsApiKey
    } else if !classification.is_legal_document {
        AnalyzeGate::NotLegal
    } else {
        AnalyzeGate::Ready
    }
}

pub fn format_export(report: &AnalysisReport, generated: NaiveDateTime) -> String {
    format!(
        "T&C ANALYZER - AI ANALYSIS REPORT\n\
         Generated: {}\n\
         Page: {}\n\
         URL: {}\n\
         Document Type: {}\n\
         Confidence: {}%\n\
         \n\
         {}\n\
         \n\
         {}",
        generated.format("%Y-%m-%d %H:%M:%S"),
        or_unknown(&report.page_title),
        or_unknown(&report.page_url),
        or_unknown(&report.document_type),
        report.confidence,
        "=".repeat(40),
        report.body,
    )
}

pub fn export_filename(date: NaiveDate) -> String {
    format!("tc-analysis-{}.txt", date.format("%Y-%m-%d"))
}

fn or_unknown(s: &str) -> &str {
    if s.is_empty() {
        "Unknown"
    } else {
        s
    }
}
