//! Crawler module for depth-bounded browser traversal
//!
//! This module contains the core crawling logic, including:
//! - Traversal orchestration over pooled browser sessions
//! - Challenge detection and resolution waits
//! - Page data extraction
//! - Flattening the crawl tree into ordered records

mod aggregator;
mod challenge;
mod controller;
mod extractor;
mod report;
mod settings;
mod visited;

pub use aggregator::{flatten, CrawlNode, CrawlRecord, CrawlResult, CrawlTree, NodeId};
pub use challenge::ChallengeHandler;
pub use controller::CrawlController;
pub use extractor::{snapshot_from_html, PageData, PageExtractor, SNAPSHOT_SCRIPT};
pub use report::{CrawlReport, FailureKind, NodeFailure, StopReason};
pub use settings::{CrawlSettings, PolitenessDelay};
pub use visited::VisitedSet;
