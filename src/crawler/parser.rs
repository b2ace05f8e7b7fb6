//! HTML parser for extracting links
//!
//! This module turns a fetched page into the child URLs the crawl follows:
//! - Anchors are resolved against the page's own URL
//! - Only same-site HTTP(S) targets are kept
//! - At most `limit` distinct links are taken per page, in document order
//!
//! `scraper::Html` is not `Send`, so parsing happens synchronously and the
//! document is dropped before the caller awaits anything.

use crate::url::{normalize_url, same_site};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Number of same-site links followed from any single page
///
/// This throttles breadth rather than guarding correctness; raise it through
/// `links-per-page` in the crawler configuration.
pub const DEFAULT_LINKS_PER_PAGE: usize = 5;

/// Extracts up to `limit` same-site links from a page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links and links back to the page itself
/// - Targets whose host differs from `site` (a leading `www.` is ignored)
///
/// # Arguments
///
/// * `html` - The page body
/// * `page_url` - The page's own URL, used to resolve relative links
/// * `site` - The seed URL the crawl is confined to
/// * `limit` - Maximum number of links returned
///
/// # Example
///
/// ```
/// use email_harvester::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<a href="/team">Team</a><a href="https://elsewhere.test/">Out</a>"#;
/// let page = Url::parse("http://a.test/").unwrap();
/// let links = extract_links(html, &page, &page, 5);
/// assert_eq!(links.len(), 1);
/// assert_eq!(links[0].as_str(), "http://a.test/team");
/// ```
pub fn extract_links(html: &str, page_url: &Url, site: &Url, limit: usize) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let page_key = normalize_url(page_url.as_str()).ok();

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        if links.len() >= limit {
            break;
        }

        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(link) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, page_url))
        else {
            continue;
        };

        if !same_site(&link, site) || page_key.as_ref() == Some(&link) {
            continue;
        }

        if seen.insert(link.to_string()) {
            links.push(link);
        }
    }

    links
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_url(absolute.as_str()).ok()
}
