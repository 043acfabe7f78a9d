use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Desktop Chrome identity presented by every page
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Known anti-automation interstitials, checked in this order
///
/// A `text/` prefix matches visible page text; anything else is a CSS selector.
pub const DEFAULT_CHALLENGE_INDICATORS: &[&str] = &[
    "text/Verifying you are human",
    "#cf-challenge-running",
    ".hcaptcha-box",
];

/// Main configuration structure for Trawl
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub browser: BrowserConfig,
    pub challenge: ChallengeConfig,
    pub log: LogConfig,
}

/// Traversal behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum link-hops from the seed URL
    pub max_depth: u32,

    /// Lower bound of the politeness delay (milliseconds)
    pub delay_min_ms: u64,

    /// Upper bound of the politeness delay (milliseconds)
    pub delay_max_ms: u64,

    /// Stop after this many pages have been attempted
    pub max_pages: Option<usize>,

    /// Stop after this much wall-clock time (seconds)
    pub max_duration_secs: Option<u64>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            delay_min_ms: 1000,
            delay_max_ms: 3000,
            max_pages: None,
            max_duration_secs: None,
        }
    }
}

impl CrawlerConfig {
    pub fn delay_window(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.delay_min_ms),
            Duration::from_millis(self.delay_max_ms),
        )
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }
}

/// Which browser automation backend drives the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DriverKind {
    /// Headless Chrome/Chromium over the DevTools protocol
    #[default]
    Chromium,
    /// Plain HTTP fetches with the static HTML as the DOM
    Http,
}

/// When a navigation counts as finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Readiness {
    /// The initial HTML has been parsed (`DOMContentLoaded`)
    #[default]
    DomContentLoaded,
    /// All subresources have loaded (`load`)
    Load,
}

/// Browser session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserConfig {
    pub driver: DriverKind,

    pub headless: bool,

    /// User-agent string presented on every page
    pub user_agent: String,

    pub navigation_timeout_secs: u64,

    pub readiness: Readiness,

    /// Number of long-lived browser sessions kept in the pool
    pub pool_size: usize,

    /// Explicit Chrome/Chromium binary; searched for when absent
    pub chrome_path: Option<PathBuf>,

    /// Consecutive launch failures after which the crawl gives up
    pub max_consecutive_launch_failures: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            navigation_timeout_secs: 45,
            readiness: Readiness::default(),
            pool_size: 1,
            chrome_path: None,
            max_consecutive_launch_failures: 3,
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

/// Anti-automation challenge detection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ChallengeConfig {
    pub indicators: Vec<String>,

    /// How long to wait for each indicator to appear (milliseconds)
    pub detect_timeout_ms: u64,

    /// How long to wait for the post-challenge navigation (seconds)
    pub resolution_timeout_secs: u64,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            indicators: DEFAULT_CHALLENGE_INDICATORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            detect_timeout_ms: 5000,
            resolution_timeout_secs: 30,
        }
    }
}

/// Crawl log configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LogConfig {
    /// Root directory for append-only crawl logs; tracing only when absent
    pub directory: Option<PathBuf>,

    /// Category name that groups this crawler's entries
    pub category: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: None,
            category: "crawl".to_string(),
        }
    }
}
