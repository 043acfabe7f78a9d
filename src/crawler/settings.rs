//! Per-crawl settings derived from configuration

use crate::browser::NavigateOptions;
use crate::config::{Config, DEFAULT_USER_AGENT};
use rand::Rng;
use std::time::Duration;

/// Randomized pause between navigations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolitenessDelay {
    min: Duration,
    max: Duration,
}

impl PolitenessDelay {
    /// Uniform delay in `[min, max]`; the bounds are swapped if reversed
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// A fixed delay
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    /// No delay at all
    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn bounds(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    /// Draws the next delay
    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if min == max {
            return self.min;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

impl Default for PolitenessDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(3000))
    }
}

/// Knobs for a [`CrawlController`](super::CrawlController)
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub navigation: NavigateOptions,
    pub user_agent: String,
    pub delay: PolitenessDelay,
    pub pool_size: usize,
    pub max_pages: Option<usize>,
    pub max_duration: Option<Duration>,
    /// Consecutive failed launches that end the crawl
    pub max_consecutive_launch_failures: u32,
    /// LogSink category for crawl entries
    pub log_category: String,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            navigation: NavigateOptions::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            delay: PolitenessDelay::default(),
            pool_size: 1,
            max_pages: None,
            max_duration: None,
            max_consecutive_launch_failures: 3,
            log_category: "crawl".to_string(),
        }
    }
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        let (delay_min, delay_max) = config.crawler.delay_window();
        Self {
            navigation: NavigateOptions {
                timeout: config.browser.navigation_timeout(),
                readiness: config.browser.readiness,
            },
            user_agent: config.browser.user_agent.clone(),
            delay: PolitenessDelay::new(delay_min, delay_max),
            pool_size: config.browser.pool_size,
            max_pages: config.crawler.max_pages,
            max_duration: config.crawler.max_duration(),
            max_consecutive_launch_failures: config.browser.max_consecutive_launch_failures,
            log_category: config.log.category.clone(),
        }
    }
}
