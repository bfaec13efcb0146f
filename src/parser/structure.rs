use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").unwrap());
static LIST_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("ol, ul").unwrap());
static PARAGRAPH_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());

const MIN_HEADINGS: usize = 3;
const MIN_LISTS: usize = 2;
const MIN_PARAGRAPHS: usize = 5;
const MIN_STRUCTURE_SCORE: u8 = 2;

/// Element counts the structure heuristic looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureCounts {
    pub headings: usize,
    pub lists: usize,
    pub paragraphs: usize,
}

impl StructureCounts {
    /// Count headings, lists and paragraphs anywhere in the document.
    /// Call after non-content regions have been stripped.
    pub fn from_document(doc: &Html) -> Self {
        let root = doc.root_element();
        StructureCounts {
            headings: root.select(&HEADING_SEL).count(),
            lists: root.select(&LIST_SEL).count(),
            paragraphs: root.select(&PARAGRAPH_SEL).count(),
        }
    }

    pub fn is_legal_structure(&self) -> bool {
        has_legal_structure(self.headings, self.lists, self.paragraphs)
    }
}

/// True when at least two of: more than 3 headings, more than 2 lists,
/// more than 5 paragraphs.
pub fn has_legal_structure(headings: usize, lists: usize, paragraphs: usize) -> bool {
    let score = u8::from(headings > MIN_HEADINGS)
        + u8::from(lists > MIN_LISTS)
        + u8::from(paragraphs > MIN_PARAGRAPHS);
    score >= MIN_STRUCTURE_SCORE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_of_three_signals() {
        assert!(has_legal_structure(4, 3, 0));
        assert!(has_legal_structure(4, 0, 6));
        assert!(has_legal_structure(0, 3, 6));
        assert!(has_legal_structure(10, 10, 10));
    }

    #[test]
    fn single_signal_is_not_enough() {
        assert!(!has_legal_structure(50, 0, 0));
        assert!(!has_legal_structure(0, 50, 0));
        assert!(!has_legal_structure(0, 0, 50));
    }

    #[test]
    fn thresholds_are_strict() {
        // exactly at each threshold counts for nothing
        assert!(!has_legal_structure(3, 2, 5));
        assert!(!has_legal_structure(3, 3, 5));
        assert!(has_legal_structure(4, 3, 5));
    }

    #[test]
    fn counts_from_html() {
        let html = "<html><body>\
            <h1>A</h1><h2>B</h2><h3>C</h3><h4>D</h4>\
            <ul><li>x</li></ul><ol><li>y</li></ol><ul><li>z</li></ul>\
            <p>1</p><p>2</p>\
            </body></html>";
        let doc = Html::parse_document(html);
        let counts = StructureCounts::from_document(&doc);
        assert_eq!(
            counts,
            StructureCounts {
                headings: 4,
                lists: 3,
                paragraphs: 2
            }
        );
        assert!(counts.is_legal_structure());
    }

    #[test]
    fn empty_document() {
        let doc = Html::parse_document("");
        let counts = StructureCounts::from_document(&doc);
        assert_eq!(counts, StructureCounts::default());
        assert!(!counts.is_legal_structure());
    }
}
