use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SOURCE_URL: &str = "https://hkababel.higertech.com/Home/TabelMonitoring";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Configuration for the browser sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Monitoring page holding the three station tables
    pub source_url: String,

    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    /// Page navigation timeout in seconds (default: 90)
    pub navigation_timeout_secs: u64,

    /// How long to wait for a table to get its first row, in seconds (default: 60)
    pub table_timeout_secs: u64,

    /// Delay between table readiness checks in milliseconds (default: 500)
    pub poll_interval_ms: u64,

    /// User agent string to use
    pub user_agent: String,

    /// Extra command line flags for the browser
    pub chrome_args: Vec<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            headless: true,
            navigation_timeout_secs: 90,
            table_timeout_secs: 60,
            poll_interval_ms: 500,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chrome_args: Vec::new(),
        }
    }
}

impl ScraperConfig {
    /// Get the navigation timeout as a Duration
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    /// Get the table wait timeout as a Duration
    pub fn table_timeout(&self) -> Duration {
        Duration::from_secs(self.table_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        let url = url::Url::parse(&self.source_url)
            .map_err(|e| format!("Invalid source_url '{}': {}", self.source_url, e))?;
        if !matches!(url.scheme(), "http" | "https" | "file") {
            return Err(format!("Unsupported source_url scheme '{}'", url.scheme()));
        }
        if self.navigation_timeout_secs == 0 || self.table_timeout_secs == 0 {
            return Err("Timeouts must be greater than zero".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}
