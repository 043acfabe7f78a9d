//! Chromium-based driver using chromiumoxide.

use super::{
    BrowserDriver, BrowserError, BrowserPage, BrowserSession, Locator, NavigateOptions,
    PageSnapshot,
};
use crate::config::{BrowserConfig, Readiness};
use crate::crawler::SNAPSHOT_SCRIPT;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, trace, warn};

/// Environment variable that overrides browser discovery
pub const CHROME_PATH_ENV: &str = "TRAWL_CHROME_PATH";

/// Interval between DOM polls while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Hides the most common automation tells before any page script runs
const STEALTH_SCRIPT: &str = r"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
    window.chrome = window.chrome || { runtime: {} };
";

/// Identifies the current document and reports how far it has loaded
///
/// `timeOrigin` is unique per document, so a change means the page navigated.
/// `responseStatus` is 0 for documents without an HTTP response.
const DOCUMENT_STATE_SCRIPT: &str = r"({
    href: location.href,
    readyState: document.readyState,
    timeOrigin: performance.timeOrigin,
    status: (performance.getEntriesByType('navigation')[0] || {}).responseStatus || 0
})";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentState {
    href: String,
    ready_state: String,
    time_origin: f64,
    status: u16,
}

impl DocumentState {
    /// The document replacing `about:blank` has been parsed
    fn is_parsed(&self) -> bool {
        self.href != "about:blank"
            && matches!(self.ready_state.as_str(), "interactive" | "complete")
    }
}

/// Chromium launch flags that reduce automation fingerprints
const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-notifications",
    "--disable-dev-shm-usage",
    "--disable-setuid-sandbox",
    "--no-sandbox",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-popup-blocking",
    "--hide-scrollbars",
    "--mute-audio",
];

/// Find a Chrome/Chromium executable on the system.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROME_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
        warn!(
            "{} points to non-existent file: {}",
            CHROME_PATH_ENV,
            path.display()
        );
    }

    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
        ]
    };

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

/// Launches headless Chromium instances
#[derive(Debug, Clone)]
pub struct ChromiumDriver {
    headless: bool,
    chrome_path: Option<PathBuf>,
    user_agent: String,
    request_timeout: Duration,
}

/// Distinguishes profile directories of browsers launched by this process
static PROFILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

impl ChromiumDriver {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            headless: config.headless,
            chrome_path: config.chrome_path.clone(),
            user_agent: config.user_agent.clone(),
            request_timeout: config.navigation_timeout(),
        }
    }

    fn executable(&self) -> Result<PathBuf, BrowserError> {
        self.chrome_path
            .clone()
            .or_else(find_chromium)
            .ok_or_else(|| {
                BrowserError::Launch(format!(
                    "Chrome/Chromium executable not found; set {} or browser.chrome-path",
                    CHROME_PATH_ENV
                ))
            })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let chrome_path = self.executable()?;

        let profile_dir = std::env::temp_dir().join(format!(
            "trawl-chrome-{}-{}",
            std::process::id(),
            PROFILE_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&profile_dir).map_err(|e| {
            BrowserError::Launch(format!(
                "failed to create profile directory {}: {}",
                profile_dir.display(),
                e
            ))
        })?;

        let mut builder = LaunchConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(self.request_timeout)
            .window_size(1920, 1080)
            .user_data_dir(profile_dir.clone())
            .arg(format!("--user-agent={}", self.user_agent));
        if !self.headless {
            builder = builder.with_head();
        }
        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }

        let config = builder
            .build()
            .map_err(|e| BrowserError::Launch(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let message = e.to_string();
                    // chromiumoxide does not know every CDP event Chrome emits
                    if message.contains("data did not match any variant")
                        || message.contains("Failed to deserialize WS response")
                    {
                        trace!("Suppressed CDP deserialization error: {}", message);
                    } else {
                        error!("Browser handler error: {:?}", e);
                    }
                }
            }
            debug!("Browser handler task completed");
        });

        info!("Launched Chromium (profile {})", profile_dir.display());

        Ok(Box::new(ChromiumSession {
            browser,
            handler: handler_task,
            profile_dir,
        }))
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

/// A running Chromium process and its event handler task
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Protocol(format!("failed to create page: {e}")))?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams {
            source: STEALTH_SCRIPT.to_string(),
            include_command_line_api: None,
            world_name: None,
            run_immediately: None,
        })
        .await
        .map_err(|e| BrowserError::Protocol(format!("failed to install stealth script: {e}")))?;

        Ok(Box::new(ChromiumPage {
            page,
            document: Mutex::new(None),
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        let ChromiumSession {
            mut browser,
            handler,
            profile_dir,
        } = *self;

        let closed = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Protocol(format!("failed to close browser: {e}")));
        if let Err(e) = browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        handler.abort();

        if let Err(e) = std::fs::remove_dir_all(&profile_dir) {
            debug!(
                "Failed to clean up profile directory {}: {}",
                profile_dir.display(),
                e
            );
        }

        closed
    }
}

/// A single Chromium tab.
pub struct ChromiumPage {
    page: Page,
    /// `timeOrigin` of the document the last navigation settled on
    document: Mutex<Option<f64>>,
}

impl ChromiumPage {
    async fn evaluate<T: serde::de::DeserializeOwned>(
        &self,
        script: &str,
    ) -> Result<T, BrowserError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?
            .into_value()
            .map_err(|e| BrowserError::Evaluation(format!("unexpected script result: {e}")))
    }

    async fn document_state(&self) -> Result<DocumentState, BrowserError> {
        self.evaluate(DOCUMENT_STATE_SCRIPT).await
    }

    fn remember_document(&self, time_origin: Option<f64>) {
        *self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = time_origin;
    }

    fn remembered_document(&self) -> Option<f64> {
        *self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Polls until a parsed document other than `previous` is showing
    async fn until_replaced(&self, previous: Option<f64>) -> DocumentState {
        loop {
            if let Ok(state) = self.document_state().await {
                let replaced = previous.map_or(true, |origin| state.time_origin != origin);
                if replaced && state.is_parsed() {
                    return state;
                }
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Issues the navigation without waiting for the `load` event, then
    /// polls until the new document has been parsed.
    async fn navigate_until_parsed(&self, url: &str) -> Result<DocumentState, BrowserError> {
        let response = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(reason) = response.result.error_text.clone() {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason,
            });
        }

        Ok(self.until_replaced(self.remembered_document()).await)
    }

    async fn is_present(&self, locator: &Locator) -> bool {
        match locator {
            Locator::Css(selector) => self.page.find_element(selector.as_str()).await.is_ok(),
            Locator::Text(text) => {
                let needle = serde_json::to_string(text).unwrap_or_default();
                let script = format!(
                    "document.body !== null && document.body.innerText.includes({})",
                    needle
                );
                self.evaluate::<bool>(&script).await.unwrap_or(false)
            }
        }
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn set_identity(&self, user_agent: &str) -> Result<(), BrowserError> {
        self.page
            .set_user_agent(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Protocol(format!("failed to set user agent: {e}")))
    }

    async fn goto(&self, url: &str, options: NavigateOptions) -> Result<(), BrowserError> {
        let navigation = async {
            match options.readiness {
                Readiness::DomContentLoaded => self.navigate_until_parsed(url).await,
                Readiness::Load => match self.page.goto(url).await {
                    Ok(_) => self.document_state().await,
                    Err(e) => Err(BrowserError::Navigation {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }),
                },
            }
        };

        let state = timeout(options.timeout, navigation)
            .await
            .map_err(|_| BrowserError::timeout("Navigation", options.timeout))??;
        self.remember_document(Some(state.time_origin));

        if state.status != 0 && !(200..300).contains(&state.status) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: format!("HTTP {}", state.status),
            });
        }
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, limit: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + limit;
        loop {
            if self.is_present(locator).await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::timeout("Waiting for selector", limit));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Waits for the document loaded by `goto` to be replaced
    ///
    /// A navigation that already happened since `goto` counts, so a
    /// challenge that clears itself during indicator polling is not missed.
    async fn wait_for_navigation(&self, limit: Duration) -> Result<(), BrowserError> {
        let previous = match self.remembered_document() {
            Some(origin) => Some(origin),
            None => self.document_state().await.ok().map(|s| s.time_origin),
        };

        let state = timeout(limit, self.until_replaced(previous))
            .await
            .map_err(|_| BrowserError::timeout("Waiting for navigation", limit))?;
        debug!("Navigated to {}", state.href);
        self.remember_document(Some(state.time_origin));
        Ok(())
    }

    async fn snapshot(&self) -> Result<PageSnapshot, BrowserError> {
        self.evaluate(SNAPSHOT_SCRIPT).await
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.page
            .close()
            .await
            .map_err(|e| BrowserError::Protocol(format!("failed to close page: {e}")))
    }
}
