use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NON_CONTENT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script, style, nav, header, footer, aside").unwrap());

/// Content containers, most specific first. `body` is the last resort.
const CONTAINER_SELECTORS: &[&str] = &[
    "main",
    r#"[role="main"]"#,
    ".main-content",
    "#main-content",
    ".content",
    "body",
];

static CONTAINER_SELS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTAINER_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});

/// Elements whose text is never rendered.
const HIDDEN_TAGS: &[&str] = &["head", "noscript", "template", "script", "style"];

/// Elements rendered on their own line(s).
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "dd", "details", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "form", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main",
    "ol", "p", "pre", "section", "summary", "table", "td", "th", "tr", "ul",
];

/// Detach script/style/nav/header/footer/aside subtrees. Returns how many were removed.
pub fn strip_non_content(doc: &mut Html) -> usize {
    let ids: Vec<_> = doc
        .root_element()
        .select(&NON_CONTENT_SEL)
        .map(|el| el.id())
        .collect();
    let mut removed = 0;
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
            removed += 1;
        }
    }
    removed
}

/// Pick the most specific content container, falling back to `body`
/// and then to the root element.
pub fn select_container(doc: &Html) -> ElementRef<'_> {
    // detached nodes stay in the arena, so always search from the root
    let root = doc.root_element();
    CONTAINER_SELS
        .iter()
        .find_map(|sel| root.select(sel).next())
        .unwrap_or(root)
}

/// Visible text of the content container, with line breaks around block
/// elements. Whitespace is left as rendered.
pub fn visible_text(doc: &Html) -> String {
    let mut out = String::new();
    push_visible(select_container(doc), &mut out);
    out
}

fn push_visible(el: ElementRef, out: &mut String) {
    let name = el.value().name();
    if HIDDEN_TAGS.contains(&name) || el.value().attr("hidden").is_some() {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }

    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    push_visible(child_el, out);
                }
            }
            _ => {}
        }
    }
    if block {
        out.push('\n');
    }
}

/// Collapse every whitespace run (newlines included) to one space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Strip non-content regions, select the content container and return its
/// normalized text. Empty when the page has no text.
pub fn normalize(doc: &mut Html) -> String {
    strip_non_content(doc);
    normalize_whitespace(&visible_text(doc))
}

/// Whitespace-delimited token count. An empty string counts as one token.
pub fn word_count(text: &str) -> usize {
    WHITESPACE_RE.split(text).count()
}
