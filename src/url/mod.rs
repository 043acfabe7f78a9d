//! URL handling module for Trawl
//!
//! Links discovered on a page are resolved by the extractor and then
//! normalized here before they are compared against the visited set, so
//! two spellings of the same page are only crawled once.

mod normalize;

pub use normalize::normalize_url;

use crate::UrlError;
use url::Url;

/// Resolves an `href` attribute against the page it was found on
///
/// An empty href points back at the page itself, as it does in a browser.
/// Returns `None` for values that do not resolve to a URL at all. Non-HTTP
/// schemes (`mailto:`, `javascript:`) are kept: the extractor reports every
/// anchor and leaves filtering to the crawler.
pub fn resolve_href(href: &str, base: &Url) -> Option<String> {
    base.join(href.trim()).ok().map(String::from)
}

/// Returns the normalized form of `link` if it is a well-formed absolute
/// HTTP(S) URL worth following
pub fn crawlable(link: &str) -> Result<String, UrlError> {
    normalize_url(link).map(String::from)
}
