//! HTML collaborator: text and link extraction
//!
//! Pure functions over raw HTML; no side effects.

use scraper::{Html, Selector};
use url::Url;

/// Elements whose text never belongs to the page's readable content
const NON_CONTENT_ELEMENTS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "noscript", "template",
];

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Readable text content
    pub text: String,

    /// All candidate links found on the page (absolute URLs)
    pub links: Vec<String>,
}

/// Parses HTML content and extracts title, readable text, and links
pub fn parse_page(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        text: extract_document_text(&document),
        links: extract_document_links(&document, base_url),
    }
}

/// Extracts the readable text of a page
///
/// Skips script, style, and chrome elements (nav, header, footer, aside)
/// and collapses whitespace runs.
pub fn extract_text(html: &str) -> String {
    extract_document_text(&Html::parse_document(html))
}

/// Extracts all candidate links from a page, resolved against the base URL
pub fn extract_links(html: &str, base_url: &Url) -> Vec<String> {
    extract_document_links(&Html::parse_document(html), base_url)
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_document_text(document: &Html) -> String {
    let mut chunks: Vec<String> = Vec::new();

    for node in document.root_element().descendants() {
        let text = match node.value().as_text() {
            Some(t) => t,
            None => continue,
        };

        let in_non_content = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| NON_CONTENT_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });

        if in_non_content {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            chunks.push(collapse_whitespace(trimmed));
        }
    }

    chunks.join("\n")
}

fn extract_document_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            // Download links target files, not pages
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL
///
/// Returns None for links that cannot point at a fetchable page:
/// javascript:, mailto:, tel:, data: schemes, fragment-only anchors,
/// and anything that fails to resolve to HTTP(S).
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
