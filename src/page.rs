use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use tracing::info;

use crate::parser::normalize::normalize_whitespace;

static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

/// A page as loaded, before any analysis.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub title: String,
    pub html: String,
}

impl Page {
    pub fn from_html(url: &str, html: String) -> Self {
        let title = extract_title(&html);
        Page {
            url: url.to_string(),
            title,
            html,
        }
    }

    /// Read a saved page. The URL defaults to a `file://` URL of the path.
    pub fn from_file(path: &Path, url: Option<&str>) -> Result<Self> {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let url = match url {
            Some(u) => u.to_string(),
            None => file_url(path),
        };
        Ok(Page::from_html(&url, html))
    }
}

/// Load a page from an http(s) URL or a local file path.
pub async fn load(source: &str, url: Option<&str>) -> Result<Page> {
    if is_remote(source) {
        let html = fetch(source).await?;
        Ok(Page::from_html(url.unwrap_or(source), html))
    } else {
        Page::from_file(Path::new(source), url)
    }
}

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

async fn fetch(url: &str) -> Result<String> {
    info!("Fetching {}", url);
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Request to {} failed", url))?
        .error_for_status()?;
    Ok(response.text().await?)
}

/// Document title with whitespace collapsed, empty when missing.
pub fn extract_title(html: &str) -> String {
    let doc = Html::parse_document(html);
    doc.select(&TITLE_SEL)
        .next()
        .map(|t| normalize_whitespace(&t.text().collect::<String>()))
        .unwrap_or_default()
}

fn file_url(path: &Path) -> String {
    let abs = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", abs.display())
}
