use serde::{Deserialize, Serialize};
use tracing::debug;

use super::normalize::word_count;
use super::structure::StructureCounts;

/// URL substrings, checked in order. Only the first hit scores.
pub const URL_PATTERNS: &[&str] = &[
    "terms", "privacy", "policy", "legal", "agreement", "tos", "eula", "conditions",
    "guidelines", "disclaimer", "cookies",
];

/// Legal document names. Used for the title (first hit) and body (distinct hits).
pub const LEGAL_KEYWORDS: &[&str] = &[
    "terms of service",
    "terms of use",
    "privacy policy",
    "user agreement",
    "license agreement",
    "end user license",
    "acceptable use policy",
    "cookie policy",
    "data processing",
    "terms and conditions",
    "user terms",
    "service terms",
    "legal notice",
    "disclaimer",
    "data policy",
    "privacy notice",
    "community guidelines",
];

/// Boilerplate found in the body of legal documents.
pub const LEGAL_PHRASES: &[&str] = &[
    "by using this service",
    "by accessing this website",
    "you agree to",
    "these terms constitute",
    "this agreement is entered into",
    "we collect information",
    "personal data",
    "cookies and tracking",
    "your rights",
    "data retention",
    "third party services",
    "liability limitation",
    "governing law",
    "dispute resolution",
    "termination of service",
    "intellectual property",
    "user content",
];

/// Document types in priority order with their trigger keywords.
pub const DOCUMENT_TYPES: &[(&str, &[&str])] = &[
    ("Privacy Policy", &["privacy policy", "privacy notice", "data policy"]),
    ("Terms of Service", &["terms of service", "terms of use", "user agreement"]),
    ("Cookie Policy", &["cookie policy", "cookies notice"]),
    ("License Agreement", &["license agreement", "eula", "end user license"]),
    ("Acceptable Use Policy", &["acceptable use", "community guidelines"]),
    ("Legal Notice", &["legal notice", "disclaimer", "legal information"]),
];

pub const FALLBACK_DOCUMENT_TYPE: &str = "Legal Document";

const URL_WEIGHT: u32 = 25;
const TITLE_WEIGHT: u32 = 30;
const KEYWORD_WEIGHT: u32 = 10;
const KEYWORD_CAP: u32 = 30;
const PHRASE_WEIGHT: u32 = 5;
const PHRASE_CAP: u32 = 25;
const STRUCTURE_WEIGHT: u32 = 20;
const MAX_CONFIDENCE: u32 = 100;
/// Scores strictly above this are legal documents.
pub const DETECTION_THRESHOLD: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub confidence: u32,
    pub is_legal_document: bool,
    /// Evidence in evaluation order: URL, title, keywords, phrases, structure.
    pub reasons: Vec<String>,
    pub document_type: String,
    pub word_count: usize,
}

/// Score a page. `body_text` should already be whitespace-normalized.
pub fn classify(
    url: &str,
    title: &str,
    body_text: &str,
    structure: &StructureCounts,
) -> ClassificationResult {
    let url = url.to_lowercase();
    let title = title.to_lowercase();
    let body = body_text.to_lowercase();

    let mut confidence = 0;
    let mut reasons = Vec::new();

    if let Some(pattern) = first_match(&url, URL_PATTERNS) {
        confidence += URL_WEIGHT;
        reasons.push(format!("URL contains \"{}\"", pattern));
    }

    if let Some(keyword) = first_match(&title, LEGAL_KEYWORDS) {
        confidence += TITLE_WEIGHT;
        reasons.push(format!("Title contains \"{}\"", keyword));
    }

    let keyword_matches = distinct_matches(&body, LEGAL_KEYWORDS);
    if keyword_matches > 0 {
        confidence += (keyword_matches * KEYWORD_WEIGHT).min(KEYWORD_CAP);
        reasons.push(format!("Found {} legal keywords", keyword_matches));
    }

    let phrase_matches = distinct_matches(&body, LEGAL_PHRASES);
    if phrase_matches > 0 {
        confidence += (phrase_matches * PHRASE_WEIGHT).min(PHRASE_CAP);
        reasons.push(format!("Found {} legal phrases", phrase_matches));
    }

    if structure.is_legal_structure() {
        confidence += STRUCTURE_WEIGHT;
        reasons.push("Document has legal structure".to_string());
    }

    let confidence = confidence.min(MAX_CONFIDENCE);
    let document_type = detect_document_type(&title, &body).to_string();

    debug!(
        confidence,
        keyword_matches,
        phrase_matches,
        document_type = %document_type,
        "Classified page"
    );

    ClassificationResult {
        confidence,
        is_legal_document: confidence > DETECTION_THRESHOLD,
        reasons,
        document_type,
        word_count: word_count(body_text),
    }
}

/// First type in priority order whose triggers appear in the title or body.
/// Inputs are expected lower-cased. Reports the fallback label even when
/// nothing legal was found.
pub fn detect_document_type(title: &str, body: &str) -> &'static str {
    DOCUMENT_TYPES
        .iter()
        .find(|(_, triggers)| {
            triggers
                .iter()
                .any(|kw| title.contains(kw) || body.contains(kw))
        })
        .map(|(label, _)| *label)
        .unwrap_or(FALLBACK_DOCUMENT_TYPE)
}

fn first_match(haystack: &str, needles: &[&'static str]) -> Option<&'static str> {
    needles.iter().copied().find(|n| haystack.contains(n))
}

/// Number of needles present at least once.
fn distinct_matches(haystack: &str, needles: &[&str]) -> u32 {
    needles.iter().filter(|n| haystack.contains(*n)).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_STRUCTURE: StructureCounts = StructureCounts {
        headings: 0,
        lists: 0,
        paragraphs: 0,
    };
    const FULL_STRUCTURE: StructureCounts = StructureCounts {
        headings: 4,
        lists: 3,
        paragraphs: 6,
    };

    #[test]
    fn terms_page_scores_url_title_keyword_phrase() {
        let body = "Please read these terms of service. The terms of service govern \
                    your account. By using this service you accept the terms of service.";
        let r = classify(
            "https://example.com/terms-of-service",
            "Terms of Service - Example",
            body,
            &NO_STRUCTURE,
        );
        assert_eq!(r.confidence, 70);
        assert!(r.is_legal_document);
        assert_eq!(r.document_type, "Terms of Service");
        assert_eq!(
            r.reasons,
            vec![
                "URL contains \"terms\"",
                "Title contains \"terms of service\"",
                "Found 1 legal keywords",
                "Found 1 legal phrases",
            ]
        );
    }

    #[test]
    fn about_page_scores_zero() {
        let r = classify(
            "https://example.com/about",
            "About Us",
            "We are a small team.",
            &NO_STRUCTURE,
        );
        assert_eq!(r.confidence, 0);
        assert!(!r.is_legal_document);
        assert!(r.reasons.is_empty());
        assert_eq!(r.document_type, FALLBACK_DOCUMENT_TYPE);
        assert_eq!(r.word_count, 5);
    }

    #[test]
    fn structure_alone_is_not_a_detection() {
        let r = classify(
            "https://example.com/blog/post",
            "Weekly update",
            "Section one. Section two. Section three.",
            &FULL_STRUCTURE,
        );
        assert_eq!(r.confidence, 20);
        assert!(!r.is_legal_document);
        assert_eq!(r.reasons, vec!["Document has legal structure"]);
    }

    #[test]
    fn url_is_first_match_only() {
        // "privacy" and "policy" both present, one award
        let r = classify("https://example.com/privacy-policy", "", "", &NO_STRUCTURE);
        assert_eq!(r.confidence, 25);
        assert_eq!(r.reasons, vec!["URL contains \"privacy\""]);
    }

    #[test]
    fn url_match_is_case_insensitive() {
        let r = classify("https://Example.com/LEGAL/Notice", "", "", &NO_STRUCTURE);
        assert_eq!(r.reasons, vec!["URL contains \"legal\""]);
    }

    #[test]
    fn title_is_first_match_only() {
        let r = classify(
            "https://example.com/",
            "Privacy Policy and Terms of Use",
            "",
            &NO_STRUCTURE,
        );
        assert_eq!(r.confidence, 30);
        // list order decides, not title order
        assert_eq!(r.reasons, vec!["Title contains \"terms of use\""]);
    }

    #[test]
    fn body_keywords_count_once_each_and_cap() {
        let once = classify("", "", "privacy policy privacy policy privacy policy", &NO_STRUCTURE);
        assert_eq!(once.confidence, 10);
        assert_eq!(once.reasons, vec!["Found 1 legal keywords"]);

        let many = classify(
            "",
            "",
            "terms of service, privacy policy, cookie policy, legal notice",
            &NO_STRUCTURE,
        );
        assert_eq!(many.confidence, 30);
        assert_eq!(many.reasons, vec!["Found 4 legal keywords"]);
    }

    #[test]
    fn phrases_cap_at_twenty_five() {
        let body = "you agree to. personal data. your rights. governing law. \
                    dispute resolution. user content.";
        let r = classify("", "", body, &NO_STRUCTURE);
        assert_eq!(r.confidence, 25);
        assert_eq!(r.reasons, vec!["Found 6 legal phrases"]);
    }

    #[test]
    fn confidence_clamped_to_hundred() {
        let body = "terms of service privacy policy cookie policy legal notice \
                    you agree to personal data your rights governing law user content";
        let r = classify(
            "https://example.com/terms",
            "Terms of Service",
            body,
            &FULL_STRUCTURE,
        );
        // 25 + 30 + 30 + 25 + 20
        assert_eq!(r.confidence, 100);
        assert_eq!(r.reasons.len(), 5);
        assert!(r.reasons[4] == "Document has legal structure");
    }

    #[test]
    fn exactly_fifty_is_not_a_detection() {
        // url 25 + phrases 25
        let body = "you agree to personal data your rights governing law user content";
        let r = classify("https://example.com/legal", "", body, &NO_STRUCTURE);
        assert_eq!(r.confidence, 50);
        assert!(!r.is_legal_document);

        // one more keyword tips it over
        let r = classify(
            "https://example.com/legal",
            "",
            &format!("{} disclaimer", body),
            &NO_STRUCTURE,
        );
        assert_eq!(r.confidence, 60);
        assert!(r.is_legal_document);
    }

    #[test]
    fn single_weak_signal_never_detects() {
        let cases = [
            classify("https://x.com/terms", "", "", &NO_STRUCTURE),
            classify("", "Privacy Policy", "", &NO_STRUCTURE),
            classify("", "", "privacy policy", &NO_STRUCTURE),
            classify("", "", "personal data", &NO_STRUCTURE),
            classify("", "", "", &FULL_STRUCTURE),
        ];
        for r in cases {
            assert!(!r.is_legal_document, "{:?}", r);
        }
    }

    #[test]
    fn verdict_tracks_threshold() {
        let bodies = [
            "",
            "privacy policy",
            "privacy policy personal data",
            "terms of use you agree to governing law",
            "eula end user license license agreement user content your rights",
        ];
        let urls = ["", "https://a.com/tos", "https://a.com/home"];
        let titles = ["", "Cookie Policy", "Home"];
        for url in urls {
            for title in titles {
                for body in bodies {
                    for s in [NO_STRUCTURE, FULL_STRUCTURE] {
                        let r = classify(url, title, body, &s);
                        assert!(r.confidence <= 100);
                        assert_eq!(r.is_legal_document, r.confidence > 50);
                    }
                }
            }
        }
    }

    #[test]
    fn more_matches_never_lower_confidence() {
        let additions = [
            "terms of use",
            "personal data",
            "cookie policy",
            "governing law",
            "disclaimer",
            "your rights",
            "data retention",
            "user terms",
        ];
        let mut body = String::from("Welcome.");
        let mut last = classify("https://a.com/x", "Home", &body, &NO_STRUCTURE).confidence;
        for extra in additions {
            body.push(' ');
            body.push_str(extra);
            let next = classify("https://a.com/x", "Home", &body, &NO_STRUCTURE).confidence;
            assert!(next >= last, "{} dropped to {} after adding {:?}", last, next, extra);
            last = next;
        }
    }

    #[test]
    fn document_type_priority() {
        assert_eq!(detect_document_type("", "cookie policy and privacy notice"), "Privacy Policy");
        assert_eq!(detect_document_type("end user license", "terms of use"), "Terms of Service");
        assert_eq!(detect_document_type("", "our cookies notice"), "Cookie Policy");
        assert_eq!(detect_document_type("software eula", ""), "License Agreement");
        assert_eq!(detect_document_type("", "acceptable use of the forum"), "Acceptable Use Policy");
        assert_eq!(detect_document_type("", "legal information"), "Legal Notice");
        assert_eq!(detect_document_type("", "nothing here"), FALLBACK_DOCUMENT_TYPE);
    }

    #[test]
    fn document_type_is_stable() {
        let a = classify("", "Data Policy", "community guidelines", &NO_STRUCTURE);
        let b = classify("", "Data Policy", "community guidelines", &NO_STRUCTURE);
        assert_eq!(a.document_type, "Privacy Policy");
        assert_eq!(a, b);
    }

    #[test]
    fn empty_body_still_classifies() {
        let r = classify("", "", "", &NO_STRUCTURE);
        assert_eq!(r.confidence, 0);
        assert!(!r.is_legal_document);
        assert_eq!(r.document_type, FALLBACK_DOCUMENT_TYPE);
        assert_eq!(r.word_count, 1);
    }
}
