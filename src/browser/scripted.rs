//! In-memory browser driver
//!
//! Serves a fixed link graph with scripted failures, challenges and delays.
//! All waiting goes through `tokio::time`, so tests running on a paused
//! clock observe exact elapsed times without real sleeping.

use super::{
    BrowserDriver, BrowserError, BrowserPage, BrowserSession, Locator, NavigateOptions,
    PageSnapshot,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a scripted page misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    /// Navigation fails immediately (connection refused, non-2xx)
    Navigation,
    /// Navigation never completes within its timeout
    Hang,
    /// DOM evaluation throws
    Extraction,
}

/// An anti-automation interstitial shown on a scripted page
#[derive(Debug, Clone)]
struct ScriptedChallenge {
    locators: Vec<Locator>,
    /// Time until the post-challenge navigation; `None` never resolves
    resolves_after: Option<Duration>,
}

/// One page of a scripted site
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    title: String,
    headings: Vec<String>,
    hrefs: Vec<String>,
    challenge: Option<ScriptedChallenge>,
    failure: Option<ScriptedFailure>,
    load_time: Duration,
}

impl ScriptedPage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Anchors on the page, as written in their `href` attributes
    pub fn links<I, S>(mut self, hrefs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hrefs = hrefs.into_iter().map(Into::into).collect();
        self
    }

    pub fn headings<I, S>(mut self, headings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headings = headings.into_iter().map(Into::into).collect();
        self
    }

    /// Shows `locator` until a navigation `resolves_after` the given time
    pub fn challenge(self, locator: Locator, resolves_after: Option<Duration>) -> Self {
        self.challenges([locator], resolves_after)
    }

    /// Shows every locator at once; a single navigation clears them all
    pub fn challenges<I>(mut self, locators: I, resolves_after: Option<Duration>) -> Self
    where
        I: IntoIterator<Item = Locator>,
    {
        self.challenge = Some(ScriptedChallenge {
            locators: locators.into_iter().collect(),
            resolves_after,
        });
        self
    }

    pub fn failing(mut self, failure: ScriptedFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Time the navigation itself takes
    pub fn load_time(mut self, load_time: Duration) -> Self {
        self.load_time = load_time;
        self
    }
}

/// A set of scripted pages keyed by URL
#[derive(Debug, Clone, Default)]
pub struct ScriptedSite {
    pages: HashMap<String, ScriptedPage>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: impl Into<String>, page: ScriptedPage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }
}

#[derive(Debug, Default)]
struct DriverState {
    launches: AtomicUsize,
    closes: AtomicUsize,
    failing_launches: AtomicUsize,
    navigation_waits: AtomicUsize,
    navigations: Mutex<Vec<String>>,
    identities: Mutex<Vec<String>>,
}

/// Browser driver backed by a [`ScriptedSite`]
///
/// Clones share their counters, so a test can keep one handle for
/// assertions while the crawler owns another.
#[derive(Debug, Clone)]
pub struct ScriptedDriver {
    site: Arc<ScriptedSite>,
    state: Arc<DriverState>,
}

impl ScriptedDriver {
    pub fn new(site: ScriptedSite) -> Self {
        Self {
            site: Arc::new(site),
            state: Arc::new(DriverState::default()),
        }
    }

    /// Makes the next `n` launches fail
    pub fn fail_next_launches(&self, n: usize) {
        self.state.failing_launches.store(n, Ordering::SeqCst);
    }

    /// Every URL passed to `goto`, in order
    pub fn navigations(&self) -> Vec<String> {
        lock(&self.state.navigations).clone()
    }

    /// Every user-agent presented, in order
    pub fn identities(&self) -> Vec<String> {
        lock(&self.state.identities).clone()
    }

    /// Number of `wait_for_navigation` calls across all pages
    pub fn navigation_waits(&self) -> usize {
        self.state.navigation_waits.load(Ordering::SeqCst)
    }

    pub fn launch_count(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Sessions launched and not yet closed
    pub fn open_sessions(&self) -> usize {
        self.launch_count() - self.close_count()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let failing = self
            .state
            .failing_launches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BrowserError::Launch("scripted launch failure".to_string()));
        }

        self.state.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            site: Arc::clone(&self.site),
            state: Arc::clone(&self.state),
        }))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct ScriptedSession {
    site: Arc<ScriptedSite>,
    state: Arc<DriverState>,
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        Ok(Box::new(ScriptedTab {
            site: Arc::clone(&self.site),
            state: Arc::clone(&self.state),
            current: Mutex::new(None),
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ScriptedTab {
    site: Arc<ScriptedSite>,
    state: Arc<DriverState>,
    current: Mutex<Option<(String, ScriptedPage)>>,
}

impl ScriptedTab {
    fn loaded(&self) -> Result<(String, ScriptedPage), BrowserError> {
        lock(&self.current).clone().ok_or_else(|| {
            BrowserError::Evaluation("no document has been loaded".to_string())
        })
    }
}

#[async_trait]
impl BrowserPage for ScriptedTab {
    async fn set_identity(&self, user_agent: &str) -> Result<(), BrowserError> {
        lock(&self.state.identities).push(user_agent.to_string());
        Ok(())
    }

    async fn goto(&self, url: &str, options: NavigateOptions) -> Result<(), BrowserError> {
        lock(&self.state.navigations).push(url.to_string());

        let page = self
            .site
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| BrowserError::Navigation {
                url: url.to_string(),
                reason: "HTTP 404".to_string(),
            })?;

        match page.failure {
            Some(ScriptedFailure::Navigation) => {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_CONNECTION_REFUSED".to_string(),
                })
            }
            Some(ScriptedFailure::Hang) => {
                tokio::time::sleep(options.timeout).await;
                return Err(BrowserError::timeout("Navigation", options.timeout));
            }
            _ => {}
        }

        if page.load_time > options.timeout {
            tokio::time::sleep(options.timeout).await;
            return Err(BrowserError::timeout("Navigation", options.timeout));
        }
        tokio::time::sleep(page.load_time).await;

        *lock(&self.current) = Some((url.to_string(), page));
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        let (_, page) = self.loaded()?;
        let present = page
            .challenge
            .as_ref()
            .is_some_and(|challenge| challenge.locators.contains(locator));

        if present {
            return Ok(());
        }
        tokio::time::sleep(timeout).await;
        Err(BrowserError::timeout("Waiting for selector", timeout))
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), BrowserError> {
        self.state.navigation_waits.fetch_add(1, Ordering::SeqCst);
        let (url, mut page) = self.loaded()?;
        let resolves_after = page.challenge.as_ref().and_then(|c| c.resolves_after);

        match resolves_after {
            Some(after) if after <= timeout => {
                tokio::time::sleep(after).await;
                page.challenge = None;
                *lock(&self.current) = Some((url, page));
                Ok(())
            }
            _ => {
                tokio::time::sleep(timeout).await;
                Err(BrowserError::timeout("Waiting for navigation", timeout))
            }
        }
    }

    async fn snapshot(&self) -> Result<PageSnapshot, BrowserError> {
        let (url, page) = self.loaded()?;
        if page.failure == Some(ScriptedFailure::Extraction) {
            return Err(BrowserError::Evaluation(
                "TypeError: Cannot read properties of null".to_string(),
            ));
        }

        Ok(PageSnapshot {
            base_url: url.clone(),
            url,
            title: page.title,
            headings: page.headings,
            hrefs: page.hrefs,
        })
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> ScriptedSite {
        ScriptedSite::new()
            .page(
                "https://example.test/a",
                ScriptedPage::new("A").links(["/b"]).headings(["Welcome"]),
            )
            .page(
                "https://example.test/gate",
                ScriptedPage::new("Gate").challenge(
                    Locator::Css("#cf-challenge-running".to_string()),
                    Some(Duration::from_secs(2)),
                ),
            )
    }

    async fn open(driver: &ScriptedDriver) -> Box<dyn BrowserPage> {
        let session = driver.launch().await.unwrap();
        session.new_page().await.unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_of_loaded_page() {
        let driver = ScriptedDriver::new(site());
        let page = open(&driver).await;

        page.goto("https://example.test/a", NavigateOptions::default())
            .await
            .unwrap();
        let snapshot = page.snapshot().await.unwrap();

        assert_eq!(snapshot.title, "A");
        assert_eq!(snapshot.hrefs, vec!["/b"]);
        assert_eq!(driver.navigations(), vec!["https://example.test/a"]);
    }

    #[tokio::test]
    async fn test_unknown_url_fails_navigation() {
        let driver = ScriptedDriver::new(site());
        let page = open(&driver).await;

        let err = page
            .goto("https://example.test/missing", NavigateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::Navigation { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_challenge_resolves_after_delay() {
        let driver = ScriptedDriver::new(site());
        let page = open(&driver).await;
        page.goto("https://example.test/gate", NavigateOptions::default())
            .await
            .unwrap();

        let locator = Locator::Css("#cf-challenge-running".to_string());
        page.wait_for(&locator, Duration::from_secs(5)).await.unwrap();

        let start = tokio::time::Instant::now();
        page.wait_for_navigation(Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(2));

        // Resolved challenges no longer match
        assert!(page
            .wait_for(&locator, Duration::from_secs(1))
            .await
            .unwrap_err()
            .is_timeout());
    }

    #[tokio::test]
    async fn test_failed_launches_are_counted_down() {
        let driver = ScriptedDriver::new(site());
        driver.fail_next_launches(2);

        assert!(driver.launch().await.is_err());
        assert!(driver.launch().await.is_err());
        assert!(driver.launch().await.is_ok());
        assert_eq!(driver.launch_count(), 1);
    }
}
