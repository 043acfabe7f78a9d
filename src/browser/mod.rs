//! Browser automation layer
//!
//! The crawler only talks to a browser through the traits defined here:
//! a [`BrowserDriver`] launches sessions, a [`BrowserSession`] opens pages,
//! and a [`BrowserPage`] navigates, waits and reports its DOM state.
//!
//! Two drivers are provided:
//! - [`chromium::ChromiumDriver`] - headless Chrome over the DevTools protocol
//! - [`http::HttpDriver`] - plain HTTP fetches with the static HTML as the DOM
//!
//! Unit tests use an in-memory link graph driver instead.

pub mod chromium;
pub mod http;
mod pool;
#[cfg(test)]
pub(crate) mod scripted;

pub use pool::{SessionLease, SessionPool};

use crate::config::Readiness;
use crate::ConfigError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by browser collaborators
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Page evaluation failed: {0}")]
    Evaluation(String),

    #[error("Browser protocol error: {0}")]
    Protocol(String),

    #[error("Browser session is closed")]
    Closed,
}

impl BrowserError {
    pub fn timeout(operation: &'static str, timeout: Duration) -> Self {
        Self::Timeout { operation, timeout }
    }

    /// Returns true if the operation gave up waiting rather than failing outright
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Options for a single navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    pub timeout: Duration,
    pub readiness: Readiness,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(45),
            readiness: Readiness::DomContentLoaded,
        }
    }
}

/// Something that can be waited for on a page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// An element matching a CSS selector
    Css(String),
    /// Visible text contained in the page body
    Text(String),
}

impl Locator {
    const TEXT_PREFIX: &'static str = "text/";

    /// Parses the configuration form: `text/<needle>` or a CSS selector
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        let locator = match raw.strip_prefix(Self::TEXT_PREFIX) {
            Some(text) => Self::Text(text.trim().to_string()),
            None => Self::Css(raw.to_string()),
        };

        match &locator {
            Self::Css(s) | Self::Text(s) if s.is_empty() => {
                Err(ConfigError::InvalidIndicator(format!("empty locator '{}'", raw)))
            }
            Self::Css(s) if scraper::Selector::parse(s).is_err() => Err(
                ConfigError::InvalidIndicator(format!("'{}' is not a valid CSS selector", s)),
            ),
            _ => Ok(locator),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => f.write_str(selector),
            Self::Text(text) => write!(f, "{}{}", Self::TEXT_PREFIX, text),
        }
    }
}

/// Raw DOM state read from a loaded page
///
/// Hrefs are the attribute values as written; the extractor resolves them
/// against `base_url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    /// The document URL after any redirects
    pub url: String,
    /// The URL relative links resolve against (`document.baseURI`)
    pub base_url: String,
    pub title: String,
    /// Text content of every `h1`, `h2` and `h3`, in document order
    pub headings: Vec<String>,
    /// `href` attribute of every anchor, in document order
    pub hrefs: Vec<String>,
}

/// Launches browser sessions
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Launches a new browser instance
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// One running browser instance
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Opens a fresh page context
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError>;

    /// Shuts the browser down and releases its resources
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

/// A single page context
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Sets the user-agent presented on subsequent requests
    async fn set_identity(&self, user_agent: &str) -> Result<(), BrowserError>;

    /// Navigates to `url` and waits for the requested readiness
    async fn goto(&self, url: &str, options: NavigateOptions) -> Result<(), BrowserError>;

    /// Waits until `locator` is present, or fails with [`BrowserError::Timeout`]
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError>;

    /// Waits for the next navigation of this page to finish
    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), BrowserError>;

    /// Reads the current DOM state
    async fn snapshot(&self) -> Result<PageSnapshot, BrowserError>;

    /// Closes the page context
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}
