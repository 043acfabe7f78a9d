//! Crawl controller - depth-bounded traversal orchestration
//!
//! The controller walks the link graph depth-first from a start URL. Each
//! step pops a frame off an explicit stack, claims the URL in the visited
//! set, checks a browser session out of the pool, and runs navigation,
//! challenge handling and extraction on a fresh page. Links found on the
//! page are pushed back in reverse so that siblings are processed in the
//! order they appear in the DOM.
//!
//! A failure on one page is recorded and logged, and traversal continues
//! with the next frame. Only a cancelled token, an exhausted budget or a
//! browser that keeps failing to launch end a crawl early.

use super::aggregator::{flatten, CrawlTree, NodeId};
use super::challenge::ChallengeHandler;
use super::extractor::{PageData, PageExtractor};
use super::report::{CrawlReport, FailureKind, NodeFailure, StopReason};
use super::settings::CrawlSettings;
use super::visited::VisitedSet;
use crate::browser::{BrowserDriver, BrowserError, BrowserPage, Locator, SessionPool};
use crate::config::Config;
use crate::log_sink::LogSink;
use crate::url::{crawlable, normalize_url};
use crate::{ConfigResult, TrawlError};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pages between progress reports
const PROGRESS_INTERVAL: usize = 10;

/// A pending visit
struct Frame {
    /// Normalized form, used for the visited set and the record
    url: String,
    /// The link exactly as resolved on its parent page, used for navigation
    target: String,
    depth: u32,
    parent: Option<NodeId>,
}

/// What a successful visit produced
struct PageVisit {
    data: PageData,
    challenge: Option<Locator>,
}

enum VisitError {
    Failed { kind: FailureKind, error: BrowserError },
    Cancelled,
}

impl VisitError {
    fn failed(kind: FailureKind) -> impl FnOnce(BrowserError) -> Self {
        move |error| Self::Failed { kind, error }
    }
}

/// Orchestrates crawls over a pool of browser sessions
pub struct CrawlController {
    pool: SessionPool,
    challenge: ChallengeHandler,
    extractor: PageExtractor,
    log: Arc<dyn LogSink>,
    settings: CrawlSettings,
    cancel: CancellationToken,
}

impl CrawlController {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        log: Arc<dyn LogSink>,
        challenge: ChallengeHandler,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            pool: SessionPool::new(driver, settings.pool_size),
            challenge,
            extractor: PageExtractor::new(),
            log,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a controller from validated configuration
    pub fn from_config(
        config: &Config,
        driver: Arc<dyn BrowserDriver>,
        log: Arc<dyn LogSink>,
    ) -> ConfigResult<Self> {
        let challenge = ChallengeHandler::from_config(&config.challenge)?;
        Ok(Self::new(
            driver,
            log,
            challenge,
            CrawlSettings::from_config(config),
        ))
    }

    /// Uses `token` to stop crawls from outside
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Crawls from `seed` down to `max_depth` link-hops
    ///
    /// Only an unusable seed is an error. Page failures, cancellation and
    /// budgets all end in a report holding whatever was collected.
    pub async fn crawl(&self, seed: &str, max_depth: u32) -> Result<CrawlReport, TrawlError> {
        let start = normalize_url(seed).map_err(|source| TrawlError::InvalidSeed {
            url: seed.to_string(),
            source,
        })?;

        info!("Starting crawl of {} (max depth {})", start, max_depth);
        let mut visited = VisitedSet::new();
        let report = self.crawl_from(seed, max_depth, 0, &mut visited).await;

        self.log.append(
            &self.settings.log_category,
            json!({
                "event": "summary",
                "timestamp": Utc::now().to_rfc3339(),
                "seed": start.as_str(),
                "max_depth": max_depth,
                "records": report.records.len(),
                "failures": report.failures.len(),
                "pages_attempted": report.pages_attempted,
                "stop": report.stop,
                "elapsed_ms": report.elapsed.as_millis() as u64,
            }),
        );

        info!(
            "Crawl finished ({}): {} records, {} failures in {:?}",
            report.stop,
            report.records.len(),
            report.failures.len(),
            report.elapsed
        );
        Ok(report)
    }

    /// Crawls from `start` at `current_depth`, sharing `visited`
    ///
    /// Returns an empty report without touching a browser when `start` is
    /// already visited or `current_depth` exceeds `max_depth`. Pages are
    /// loaded at the address their link gives; the normalized form only
    /// decides whether two links are the same page.
    pub async fn crawl_from(
        &self,
        start: &str,
        max_depth: u32,
        current_depth: u32,
        visited: &mut VisitedSet,
    ) -> CrawlReport {
        let target = start.trim();
        let start = match crawlable(target) {
            Ok(url) => url,
            Err(e) => {
                warn!("Not crawling {}: {}", target, e);
                return CrawlReport::empty();
            }
        };

        let started = Instant::now();
        let mut tree = CrawlTree::new();
        let mut failures = Vec::new();
        let mut attempted = 0usize;
        let mut launch_failures = 0u32;
        let mut stop = StopReason::Completed;

        let mut stack = vec![Frame {
            url: start,
            target: target.to_string(),
            depth: current_depth,
            parent: None,
        }];

        while let Some(frame) = stack.pop() {
            if frame.depth > max_depth || visited.contains(&frame.url) {
                continue;
            }
            if let Some(reason) = self.stop_before_node(attempted, started) {
                stop = reason;
                break;
            }

            visited.mark(frame.url.clone());
            attempted += 1;
            let id = tree.add(frame.parent, frame.url.as_str(), frame.depth);
            debug!("Processing {} (depth {})", frame.url, frame.depth);

            match self.visit(&frame.target).await {
                Ok(visit) => {
                    launch_failures = 0;
                    self.log_success(&frame, &visit);

                    if frame.depth < max_depth {
                        let children: Vec<(String, String)> = visit
                            .data
                            .links
                            .iter()
                            .filter_map(|link| {
                                crawlable(link).ok().map(|url| (url, link.clone()))
                            })
                            .collect();
                        stack.extend(children.into_iter().rev().map(|(url, target)| Frame {
                            url,
                            target,
                            depth: frame.depth + 1,
                            parent: Some(id),
                        }));
                    }
                    tree.complete(id, visit.data);
                }
                Err(VisitError::Failed { kind, error }) => {
                    warn!("Error processing {}: {}", frame.url, error);
                    let failure = NodeFailure {
                        url: frame.url.clone(),
                        depth: frame.depth,
                        kind,
                        message: error.to_string(),
                    };
                    self.log_failure(&failure);
                    failures.push(failure);

                    if kind == FailureKind::ResourceAcquisition {
                        launch_failures += 1;
                        if launch_failures >= self.settings.max_consecutive_launch_failures {
                            warn!(
                                "Giving up after {} consecutive browser launch failures",
                                launch_failures
                            );
                            stop = StopReason::BrowserUnavailable;
                            break;
                        }
                    } else {
                        launch_failures = 0;
                    }
                }
                Err(VisitError::Cancelled) => {
                    info!("Crawl cancelled while processing {}", frame.url);
                    self.log.append(
                        &self.settings.log_category,
                        json!({
                            "event": "page",
                            "timestamp": Utc::now().to_rfc3339(),
                            "url": frame.url,
                            "depth": frame.depth,
                            "status": "cancelled",
                        }),
                    );
                    stop = StopReason::Cancelled;
                    break;
                }
            }

            if attempted % PROGRESS_INTERVAL == 0 {
                let elapsed = started.elapsed();
                info!(
                    "Progress: {} pages attempted, {} queued, {:.2} pages/sec",
                    attempted,
                    stack.len(),
                    attempted as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
                );
            }
        }

        CrawlReport {
            records: flatten(&tree),
            failures,
            stop,
            pages_attempted: attempted,
            max_depth_reached: tree.max_completed_depth(),
            elapsed: started.elapsed(),
        }
    }

    /// Closes every pooled browser session
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    fn stop_before_node(&self, attempted: usize, started: Instant) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        if self
            .settings
            .max_pages
            .is_some_and(|limit| attempted >= limit)
        {
            info!("Page budget of {} reached", attempted);
            return Some(StopReason::PageBudget);
        }
        if self
            .settings
            .max_duration
            .is_some_and(|limit| started.elapsed() >= limit)
        {
            info!("Time budget reached after {:?}", started.elapsed());
            return Some(StopReason::TimeBudget);
        }
        None
    }

    /// Processes one URL on a leased session
    ///
    /// The page is closed and the lease released on every path; a session
    /// that could not open or close a page is retired instead of reused.
    async fn visit(&self, url: &str) -> Result<PageVisit, VisitError> {
        let mut lease = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(VisitError::Cancelled),
            lease = self.pool.checkout() => {
                lease.map_err(VisitError::failed(FailureKind::ResourceAcquisition))?
            }
        };

        let opened = match lease.session() {
            Ok(session) => session.new_page().await,
            Err(e) => Err(e),
        };
        let page = match opened {
            Ok(page) => page,
            Err(e) => {
                lease.retire();
                return Err(VisitError::failed(FailureKind::ResourceAcquisition)(e));
            }
        };

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(VisitError::Cancelled),
            result = self.load_and_extract(page.as_ref(), url) => result,
        };

        if let Err(e) = page.close().await {
            warn!("Failed to close page for {}: {}", url, e);
            lease.retire();
        }
        result
    }

    async fn load_and_extract(
        &self,
        page: &dyn BrowserPage,
        url: &str,
    ) -> Result<PageVisit, VisitError> {
        page.set_identity(&self.settings.user_agent)
            .await
            .map_err(VisitError::failed(FailureKind::Navigation))?;

        info!("Scraping: {}", url);
        page.goto(url, self.settings.navigation)
            .await
            .map_err(VisitError::failed(FailureKind::Navigation))?;

        let challenge = self
            .challenge
            .await_resolution(page)
            .await
            .map_err(|error| {
                let kind = if error.is_timeout() {
                    FailureKind::ChallengeTimeout
                } else {
                    FailureKind::Navigation
                };
                VisitError::Failed { kind, error }
            })?;

        let delay = self.settings.delay.sample();
        debug!("Politeness delay of {:?} before extracting {}", delay, url);
        tokio::time::sleep(delay).await;

        let data = self
            .extractor
            .extract(page)
            .await
            .map_err(VisitError::failed(FailureKind::Extraction))?;

        debug!("Found {} links on {}", data.links.len(), url);
        Ok(PageVisit { data, challenge })
    }

    fn log_success(&self, frame: &Frame, visit: &PageVisit) {
        self.log.append(
            &self.settings.log_category,
            json!({
                "event": "page",
                "timestamp": Utc::now().to_rfc3339(),
                "url": frame.url,
                "depth": frame.depth,
                "status": "ok",
                "title": visit.data.title,
                "headings": visit.data.headings.len(),
                "links": visit.data.links.len(),
                "challenge": visit.challenge.as_ref().map(ToString::to_string),
            }),
        );
    }

    fn log_failure(&self, failure: &NodeFailure) {
        self.log.append(
            &self.settings.log_category,
            json!({
                "event": "page",
                "timestamp": Utc::now().to_rfc3339(),
                "url": failure.url,
                "depth": failure.depth,
                "status": "failed",
                "kind": failure.kind,
                "error": failure.message,
            }),
        );
    }
}
