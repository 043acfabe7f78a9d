//! Trawl: a depth-bounded browser crawler
//!
//! This crate walks hyperlinks from a seed page through a headless browser,
//! extracts the title, headings and outbound links of every page it reaches,
//! waits out anti-automation challenges, and never visits a URL twice.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod log_sink;
pub mod output;
pub mod url;

use thiserror::Error;

/// Main error type for Trawl operations
///
/// Only problems detected before traversal starts surface as this type.
/// Failures on individual pages are reported in the crawl report instead.
#[derive(Debug, Error)]
pub enum TrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid seed URL '{url}': {source}")]
    InvalidSeed { url: String, source: UrlError },

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid challenge indicator: {0}")]
    InvalidIndicator(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Trawl operations
pub type Result<T> = std::result::Result<T, TrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlController, CrawlRecord, CrawlReport, CrawlResult, PageData, StopReason};
pub use crate::url::normalize_url;
