//! Script-free driver over plain HTTP
//!
//! Fetches pages with reqwest and treats the returned HTML as the DOM. No
//! JavaScript runs, so challenge indicators are checked once against the
//! static document, and a post-challenge navigation only happens when the
//! page asks for one with `<meta http-equiv="refresh">`.

use super::{
    BrowserDriver, BrowserError, BrowserPage, BrowserSession, Locator, NavigateOptions,
    PageSnapshot,
};
use crate::config::BrowserConfig;
use crate::crawler::snapshot_from_html;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

/// Builds the HTTP client shared by every session of an [`HttpDriver`]
///
/// Redirects are followed by reqwest; the final URL becomes the document URL.
pub fn build_http_client(config: &BrowserConfig) -> Result<Client, BrowserError> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.navigation_timeout())
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|e| BrowserError::Launch(format!("failed to build HTTP client: {e}")))
}

/// Driver whose "browser" is an HTTP client
#[derive(Debug, Clone)]
pub struct HttpDriver {
    client: Client,
}

impl HttpDriver {
    pub fn new(config: &BrowserConfig) -> Result<Self, BrowserError> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BrowserDriver for HttpDriver {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        Ok(Box::new(HttpSession {
            client: self.client.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

struct HttpSession {
    client: Client,
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            user_agent: Mutex::new(None),
            document: Mutex::new(None),
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        Ok(())
    }
}

/// A fetched document
#[derive(Debug, Clone)]
struct Document {
    url: Url,
    html: String,
}

struct HttpPage {
    client: Client,
    user_agent: Mutex<Option<String>>,
    document: Mutex<Option<Document>>,
}

impl HttpPage {
    fn document(&self) -> Result<Document, BrowserError> {
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| BrowserError::Evaluation("no document has been loaded".to_string()))
    }

    async fn fetch(&self, url: &str) -> Result<Document, BrowserError> {
        let navigation_error = |reason: String| BrowserError::Navigation {
            url: url.to_string(),
            reason,
        };

        let user_agent = self
            .user_agent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let mut request = self.client.get(url);
        if let Some(user_agent) = user_agent {
            request = request.header(USER_AGENT, user_agent);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                navigation_error("request timed out".to_string())
            } else {
                navigation_error(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(navigation_error(format!("HTTP {}", status.as_u16())));
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| navigation_error(format!("failed to read body: {e}")))?;

        Ok(Document {
            url: final_url,
            html,
        })
    }

    fn store(&self, document: Document) {
        *self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(document);
    }
}

/// Checks a locator against static HTML
fn locator_matches(html: &str, locator: &Locator) -> bool {
    let document = Html::parse_document(html);
    match locator {
        Locator::Css(selector) => Selector::parse(selector)
            .map(|s| document.select(&s).next().is_some())
            .unwrap_or(false),
        Locator::Text(needle) => Selector::parse("body")
            .ok()
            .and_then(|body| document.select(&body).next())
            .map(|body| body.text().collect::<String>().contains(needle.as_str()))
            .unwrap_or(false),
    }
}

/// Parses `<meta http-equiv="refresh" content="N; url=...">`
///
/// Returns the delay and the target URL, which defaults to the page itself.
fn meta_refresh(html: &str, base: &Url) -> Option<(Duration, Url)> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("meta[http-equiv]").ok()?;

    let content = document
        .select(&selector)
        .find(|meta| {
            meta.value()
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case("refresh"))
        })?
        .value()
        .attr("content")?
        .to_string();

    let mut parts = content.splitn(2, [';', ',']);
    let seconds: f64 = parts.next()?.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    let target = match parts.next().map(str::trim) {
        Some(rest) if !rest.is_empty() => {
            let value = match rest.split_once('=') {
                Some((key, value)) if key.trim().eq_ignore_ascii_case("url") => value,
                _ => rest,
            };
            base.join(value.trim().trim_matches(['\'', '"'])).ok()?
        }
        _ => base.clone(),
    };

    Some((Duration::from_secs_f64(seconds), target))
}

#[async_trait]
impl BrowserPage for HttpPage {
    async fn set_identity(&self, user_agent: &str) -> Result<(), BrowserError> {
        *self
            .user_agent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(user_agent.to_string());
        Ok(())
    }

    async fn goto(&self, url: &str, options: NavigateOptions) -> Result<(), BrowserError> {
        // Static HTML is fully parsed once received, so every readiness is met
        let document = timeout(options.timeout, self.fetch(url))
            .await
            .map_err(|_| BrowserError::timeout("Navigation", options.timeout))??;

        self.store(document);
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, limit: Duration) -> Result<(), BrowserError> {
        let document = self.document()?;
        // A static DOM cannot change while we wait
        if locator_matches(&document.html, locator) {
            Ok(())
        } else {
            Err(BrowserError::timeout("Waiting for selector", limit))
        }
    }

    async fn wait_for_navigation(&self, limit: Duration) -> Result<(), BrowserError> {
        let document = self.document()?;

        let (delay, target) = match meta_refresh(&document.html, &document.url) {
            Some(refresh) if refresh.0 <= limit => refresh,
            _ => return Err(BrowserError::timeout("Waiting for navigation", limit)),
        };

        debug!("Following meta refresh to {} after {:?}", target, delay);
        tokio::time::sleep(delay).await;

        let remaining = limit.saturating_sub(delay);
        let next = timeout(remaining, self.fetch(target.as_str()))
            .await
            .map_err(|_| BrowserError::timeout("Waiting for navigation", limit))??;

        self.store(next);
        Ok(())
    }

    async fn snapshot(&self) -> Result<PageSnapshot, BrowserError> {
        let document = self.document()?;
        Ok(snapshot_from_html(&document.html, &document.url))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        Ok(())
    }
}
