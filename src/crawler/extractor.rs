//! Page data extraction
//!
//! Reading a page happens in two steps. A driver produces a raw
//! [`PageSnapshot`] of the loaded DOM: Chromium by evaluating
//! [`SNAPSHOT_SCRIPT`], the HTTP driver by parsing the fetched HTML with
//! [`snapshot_from_html`]. [`PageData::from_snapshot`] then cleans it up:
//! trims text and resolves every href to an absolute URL.

use crate::browser::{BrowserError, BrowserPage, PageSnapshot};
use crate::url::resolve_href;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// Script evaluated in the page to read its DOM state
///
/// Yields the fields of [`PageSnapshot`] with hrefs exactly as written.
pub const SNAPSHOT_SCRIPT: &str = r#"(() => ({
    url: document.location.href,
    baseUrl: document.baseURI,
    title: document.title || "",
    headings: Array.from(document.querySelectorAll("h1, h2, h3")).map(h => h.textContent || ""),
    hrefs: Array.from(document.querySelectorAll("a[href]")).map(a => a.getAttribute("href") || "")
}))()"#;

/// Structured data extracted from one page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageData {
    /// Document title; empty when the page has none
    pub title: String,

    /// Trimmed text of every `h1`, `h2` and `h3`, in document order
    pub headings: Vec<String>,

    /// Absolute URL of every anchor, in document order, duplicates included
    pub links: Vec<String>,
}

impl PageData {
    /// Builds page data from a raw snapshot
    ///
    /// Hrefs that cannot be resolved against the document base are dropped.
    pub fn from_snapshot(snapshot: &PageSnapshot) -> Self {
        let base = Url::parse(&snapshot.base_url)
            .or_else(|_| Url::parse(&snapshot.url))
            .ok();

        let links = match &base {
            Some(base) => snapshot
                .hrefs
                .iter()
                .filter_map(|href| resolve_href(href, base))
                .collect(),
            None => snapshot
                .hrefs
                .iter()
                .filter_map(|href| Url::parse(href.trim()).ok().map(String::from))
                .collect(),
        };

        Self {
            title: snapshot.title.trim().to_string(),
            headings: snapshot
                .headings
                .iter()
                .map(|h| h.trim().to_string())
                .collect(),
            links,
        }
    }
}

/// Reads the DOM of a static HTML document into a snapshot
///
/// A `<base href>` element changes the base URL the same way it does in a
/// browser.
pub fn snapshot_from_html(html: &str, url: &Url) -> PageSnapshot {
    let document = Html::parse_document(html);

    let base_url = select_attr(&document, "base[href]", "href")
        .next()
        .and_then(|href| url.join(href.trim()).ok())
        .unwrap_or_else(|| url.clone());

    let title = select_text(&document, "title").next().unwrap_or_default();
    let headings: Vec<String> = select_text(&document, "h1, h2, h3").collect();
    let hrefs: Vec<String> = select_attr(&document, "a[href]", "href")
        .map(str::to_string)
        .collect();

    PageSnapshot {
        url: url.to_string(),
        base_url: base_url.to_string(),
        title,
        headings,
        hrefs,
    }
}

fn select_text<'a>(document: &'a Html, selector: &str) -> impl Iterator<Item = String> + 'a {
    let selector = Selector::parse(selector).ok();
    selector
        .into_iter()
        .flat_map(move |s| {
            document
                .select(&s)
                .map(|element| element.text().collect::<String>())
                .collect::<Vec<_>>()
        })
}

fn select_attr<'a>(
    document: &'a Html,
    selector: &str,
    attr: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    let selector = Selector::parse(selector).ok();
    selector.into_iter().flat_map(move |s| {
        document
            .select(&s)
            .filter_map(|element| element.value().attr(attr))
            .collect::<Vec<_>>()
    })
}

/// Extracts [`PageData`] from a loaded page
#[derive(Debug, Clone, Copy, Default)]
pub struct PageExtractor;

impl PageExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Reads the current DOM state of `page`
    ///
    /// A pure read: an unchanged DOM yields identical data on every call.
    pub async fn extract(&self, page: &dyn BrowserPage) -> Result<PageData, BrowserError> {
        let snapshot = page.snapshot().await?;
        Ok(PageData::from_snapshot(&snapshot))
    }
}
