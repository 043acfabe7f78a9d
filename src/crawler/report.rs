//! Crawl outcome types

use super::aggregator::CrawlResult;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Why a node contributed no record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Timeout, connection error or non-2xx response
    Navigation,
    /// A challenge appeared and was not resolved in time
    ChallengeTimeout,
    /// Reading the DOM failed
    Extraction,
    /// No browser session or page could be obtained
    ResourceAcquisition,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::ChallengeTimeout => "challenge_timeout",
            Self::Extraction => "extraction",
            Self::ResourceAcquisition => "resource_acquisition",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node that failed, with enough context to diagnose it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    pub url: String,
    pub depth: u32,
    pub kind: FailureKind,
    pub message: String,
}

/// Why traversal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every reachable URL within the depth ceiling was processed
    Completed,
    /// The cancellation token fired
    Cancelled,
    /// The page budget was used up
    PageBudget,
    /// The wall-clock budget was used up
    TimeBudget,
    /// Browser sessions kept failing to launch
    BrowserUnavailable,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::PageBudget => "page_budget",
            Self::TimeBudget => "time_budget",
            Self::BrowserUnavailable => "browser_unavailable",
        }
    }

    /// Returns true if traversal ended before the link graph was exhausted
    pub fn is_partial(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a crawl produced
///
/// Failures never abort a crawl; they are listed here alongside whatever
/// records were collected.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub records: CrawlResult,
    pub failures: Vec<NodeFailure>,
    pub stop: StopReason,
    /// Nodes the crawler began processing
    pub pages_attempted: usize,
    /// Deepest depth at which a record was produced
    pub max_depth_reached: Option<u32>,
    pub elapsed: Duration,
}

impl CrawlReport {
    /// A report for a crawl that did no work
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            failures: Vec::new(),
            stop: StopReason::Completed,
            pages_attempted: 0,
            max_depth_reached: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of failures of the given kind
    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}
