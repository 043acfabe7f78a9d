//! Anti-automation challenge handling
//!
//! Interstitials such as "Verifying you are human" banners or captcha
//! widgets replace the real content until they are solved, after which the
//! page navigates to the content. The handler looks for each known
//! indicator in turn and, on the first one that appears, waits for that
//! navigation before extraction continues.

use crate::browser::{BrowserError, BrowserPage, Locator};
use crate::config::ChallengeConfig;
use crate::ConfigResult;
use std::time::Duration;
use tracing::{debug, info};

/// Waits out known challenge interstitials
#[derive(Debug, Clone)]
pub struct ChallengeHandler {
    indicators: Vec<Locator>,
    detect_timeout: Duration,
    resolution_timeout: Duration,
}

impl ChallengeHandler {
    pub fn new(
        indicators: Vec<Locator>,
        detect_timeout: Duration,
        resolution_timeout: Duration,
    ) -> Self {
        Self {
            indicators,
            detect_timeout,
            resolution_timeout,
        }
    }

    pub fn from_config(config: &ChallengeConfig) -> ConfigResult<Self> {
        let indicators = config
            .indicators
            .iter()
            .map(|raw| Locator::parse(raw))
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self::new(
            indicators,
            Duration::from_millis(config.detect_timeout_ms),
            Duration::from_secs(config.resolution_timeout_secs),
        ))
    }

    pub fn indicators(&self) -> &[Locator] {
        &self.indicators
    }

    /// Waits for any challenge on `page` to resolve
    ///
    /// Returns the indicator that was found, or `None` when the page showed
    /// no challenge. Only the first indicator found triggers a wait. A
    /// resolution that does not arrive in time is returned as an error.
    pub async fn await_resolution(
        &self,
        page: &dyn BrowserPage,
    ) -> Result<Option<Locator>, BrowserError> {
        for indicator in &self.indicators {
            match page.wait_for(indicator, self.detect_timeout).await {
                Ok(()) => {
                    info!("Waiting for challenge to finish ({})", indicator);
                    page.wait_for_navigation(self.resolution_timeout).await?;
                    debug!("Challenge {} resolved", indicator);
                    return Ok(Some(indicator.clone()));
                }
                Err(e) if e.is_timeout() => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }
}
