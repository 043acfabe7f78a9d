//! Statistics for a finished crawl
//!
//! This module summarizes a [`CrawlReport`] for display after a run.

use crate::crawler::{CrawlReport, FailureKind, StopReason};
use std::collections::HashMap;
use std::time::Duration;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Nodes the crawler began processing
    pub pages_attempted: usize,

    /// Records in the result
    pub pages_recorded: usize,

    /// Total outbound links found across recorded pages
    pub total_links: usize,

    /// Failure counts by kind
    pub failures_by_kind: HashMap<FailureKind, usize>,

    /// Deepest depth at which a record was produced
    pub max_depth_reached: Option<u32>,

    pub stop: StopReason,

    pub elapsed: Duration,
}

impl CrawlStatistics {
    pub fn from_report(report: &CrawlReport) -> Self {
        let mut failures_by_kind = HashMap::new();
        for failure in &report.failures {
            *failures_by_kind.entry(failure.kind).or_insert(0) += 1;
        }

        Self {
            pages_attempted: report.pages_attempted,
            pages_recorded: report.records.len(),
            total_links: report.records.iter().map(|r| r.data.links.len()).sum(),
            failures_by_kind,
            max_depth_reached: report.max_depth_reached,
            stop: report.stop,
            elapsed: report.elapsed,
        }
    }

    pub fn total_failures(&self) -> usize {
        self.failures_by_kind.values().sum()
    }

    /// Share of attempted pages that produced a record, in percent
    pub fn success_rate(&self) -> f64 {
        if self.pages_attempted == 0 {
            0.0
        } else {
            (self.pages_recorded as f64 / self.pages_attempted as f64) * 100.0
        }
    }
}

/// Prints statistics to stderr in a formatted manner
///
/// Stdout is left for the records themselves.
pub fn print_statistics(stats: &CrawlStatistics) {
    eprintln!("=== Crawl Statistics ===\n");

    eprintln!("Overview:");
    eprintln!("  Pages attempted: {}", stats.pages_attempted);
    eprintln!("  Pages recorded: {}", stats.pages_recorded);
    eprintln!("  Links found: {}", stats.total_links);
    match stats.max_depth_reached {
        Some(depth) => eprintln!("  Max depth reached: {}", depth),
        None => eprintln!("  Max depth reached: -"),
    }
    eprintln!("  Elapsed: {:.1}s", stats.elapsed.as_secs_f64());
    eprintln!("  Stopped: {}", stats.stop);
    eprintln!();

    if !stats.failures_by_kind.is_empty() {
        eprintln!("Failures ({}):", stats.total_failures());
        let mut counts: Vec<_> = stats.failures_by_kind.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));

        for (kind, count) in counts {
            eprintln!("  {}: {}", kind, count);
        }
        eprintln!();
    }

    eprintln!(
        "Success Rate: {:.1}% ({} / {} pages recorded)",
        stats.success_rate(),
        stats.pages_recorded,
        stats.pages_attempted
    );
}
