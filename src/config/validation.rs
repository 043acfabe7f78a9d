use crate::config::types::{BrowserConfig, ChallengeConfig, Config, CrawlerConfig, LogConfig};
use crate::browser::Locator;
use crate::ConfigError;

/// Upper bound on long-lived browser sessions
const MAX_POOL_SIZE: usize = 16;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_browser_config(&config.browser)?;
    validate_challenge_config(&config.challenge)?;
    validate_log_config(&config.log)?;
    Ok(())
}

/// Validates traversal configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.delay_min_ms > config.delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "delay-min-ms ({}) must not exceed delay-max-ms ({})",
            config.delay_min_ms, config.delay_max_ms
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    if config.max_duration_secs == Some(0) {
        return Err(ConfigError::Validation(
            "max-duration-secs must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates browser configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.navigation_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "navigation-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.pool_size < 1 || config.pool_size > MAX_POOL_SIZE {
        return Err(ConfigError::Validation(format!(
            "pool-size must be between 1 and {}, got {}",
            MAX_POOL_SIZE, config.pool_size
        )));
    }

    if config.max_consecutive_launch_failures < 1 {
        return Err(ConfigError::Validation(
            "max-consecutive-launch-failures must be >= 1".to_string(),
        ));
    }

    if let Some(path) = &config.chrome_path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "chrome-path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates challenge detection configuration
fn validate_challenge_config(config: &ChallengeConfig) -> Result<(), ConfigError> {
    for raw in &config.indicators {
        Locator::parse(raw)?;
    }

    if config.detect_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "detect-timeout-ms must be >= 1".to_string(),
        ));
    }

    if config.resolution_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "resolution-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawl log configuration
fn validate_log_config(config: &LogConfig) -> Result<(), ConfigError> {
    let category = config.category.trim();
    if category.is_empty() {
        return Err(ConfigError::Validation(
            "log category cannot be empty".to_string(),
        ));
    }

    // The category becomes a directory name
    if category.contains(['/', '\\']) || category == "." || category == ".." {
        return Err(ConfigError::Validation(format!(
            "log category must be a plain name, got '{}'",
            config.category
        )));
    }

    Ok(())
}
