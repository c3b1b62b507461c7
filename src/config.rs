//! Runtime configuration for the scraper.
//!
//! Every field has a default, so the YAML file is optional and may set only
//! the keys it cares about:
//!
//! ```yaml
//! wait_timeout_secs: 20
//! pagination_settle_ms: 6000
//! headless: false
//! ```

use crate::error::ScrapeError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Bounded wait for product links, review containers and suggestions.
    pub wait_timeout_secs: u64,
    /// Pause after every navigation so client-side rendering can finish.
    pub load_settle_ms: u64,
    /// Pause after activating a "Next" control.
    pub pagination_settle_ms: u64,
    /// Pause after typing into a type-ahead search box.
    pub typing_settle_ms: u64,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
    pub output_dir: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: 15,
            load_settle_ms: 3_000,
            pagination_settle_ms: 4_000,
            typing_settle_ms: 5_000,
            headless: true,
            chrome_path: None,
            window_width: 1920,
            window_height: 1080,
            output_dir: "output".to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn load_settle(&self) -> Duration {
        Duration::from_millis(self.load_settle_ms)
    }

    pub fn pagination_settle(&self) -> Duration {
        Duration::from_millis(self.pagination_settle_ms)
    }

    pub fn typing_settle(&self) -> Duration {
        Duration::from_millis(self.typing_settle_ms)
    }

    /// Configuration with no settle delays, for fixtures that render instantly.
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            wait_timeout_secs: 1,
            load_settle_ms: 0,
            pagination_settle_ms: 0,
            typing_settle_ms: 0,
            ..Default::default()
        }
    }
}

/// Parse configuration from YAML text.
pub fn parse_config(yaml: &str) -> Result<ScraperConfig, ScrapeError> {
    if yaml.trim().is_empty() {
        return Ok(ScraperConfig::default());
    }
    serde_yaml::from_str(yaml).map_err(|e| ScrapeError::Config(e.to_string()))
}

/// Load configuration from `path`, or the defaults when no path is given.
#[instrument(level = "info")]
pub async fn load_config(path: Option<&str>) -> Result<ScraperConfig, ScrapeError> {
    let Some(path) = path else {
        return Ok(ScraperConfig::default());
    };
    let yaml = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ScrapeError::Config(format!("{path}: {e}")))?;
    let config = parse_config(&yaml)?;
    info!(path, "Loaded configuration");
    Ok(config)
}
