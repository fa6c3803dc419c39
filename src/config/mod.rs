//! Configuration management for posmon.
//!
//! Configuration is read from `~/.config/posmon/config.toml` (or the path
//! given with `--config`). If the file doesn't exist, a default configuration
//! with comments is created. Environment variables are applied on top.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Category;
use crate::orchestrator::RunPolicy;
use crate::scheduler::{self, DEFAULT_INTERVAL_SECS};
use crate::scraper::ScraperConfig;

pub const ENV_DATA_DIR: &str = "POSMON_DATA_DIR";
pub const ENV_MODE: &str = "POSMON_MODE";
pub const ENV_SOURCE_URL: &str = "POSMON_SOURCE_URL";

/// What the binary does when started without a subcommand
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Keep running and scrape on the schedule
    #[default]
    Scheduled,
    /// Scrape once and exit
    Once,
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scheduled" | "schedule" | "cron" => Ok(Self::Scheduled),
            "once" | "oneshot" | "one-shot" => Ok(Self::Once),
            other => Err(format!("Unknown mode '{}', expected 'scheduled' or 'once'", other)),
        }
    }
}

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: RunMode,
    pub scraper: ScraperConfig,
    pub schedule: ScheduleConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Interval between runs, e.g. "10m", "1h"
    pub interval: String,
    /// Scrape immediately when the schedule starts
    pub run_on_start: bool,
    /// Pause between categories in milliseconds
    pub step_delay_ms: u64,
    /// Categories in run order
    pub order: Vec<Category>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: scheduler::format_interval(DEFAULT_INTERVAL_SECS),
            run_on_start: true,
            step_delay_ms: 2000,
            order: Category::ALL.to_vec(),
        }
    }
}

impl ScheduleConfig {
    pub fn interval_secs(&self) -> Result<u64, ConfigError> {
        scheduler::parse_interval(&self.interval).map_err(ConfigError::Invalid)
    }

    pub fn run_policy(&self) -> RunPolicy {
        RunPolicy {
            order: self.order.clone(),
            step_delay: Duration::from_millis(self.step_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the `*_latest.json` snapshot files
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })
    }

    /// Load configuration, apply environment overrides and validate
    pub fn load_with_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path: `~/.config/posmon/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("posmon").join("config.toml"))
    }

    /// Override file values with `POSMON_*` variables looked up by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = set(ENV_DATA_DIR) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(mode) = set(ENV_MODE) {
            self.mode = mode
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("{}: {}", ENV_MODE, e)))?;
        }
        if let Some(url) = set(ENV_SOURCE_URL) {
            self.scraper.source_url = url;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scraper.validate().map_err(ConfigError::Invalid)?;
        self.schedule.interval_secs()?;

        if self.schedule.order.is_empty() {
            return Err(ConfigError::Invalid("schedule.order must not be empty".to_string()));
        }
        let mut seen = HashSet::new();
        for category in &self.schedule.order {
            if !seen.insert(category) {
                return Err(ConfigError::Invalid(format!(
                    "schedule.order lists '{}' more than once",
                    category
                )));
            }
        }
        Ok(())
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# posmon configuration
#
# Environment variables override these values:
#   POSMON_DATA_DIR    storage.data_dir
#   POSMON_MODE        mode ("scheduled" or "once")
#   POSMON_SOURCE_URL  scraper.source_url

# What to do when started without a subcommand:
# "scheduled" keeps running, "once" scrapes once and exits
mode = "scheduled"

[scraper]
# Monitoring page holding the gauge, rainfall and climatology tables
source_url = "https://hkababel.higertech.com/Home/TabelMonitoring"

# Run browser in headless mode (no visible window)
headless = true

# Page navigation timeout in seconds
navigation_timeout_secs = 90

# How long to wait for a table to get its first row, in seconds
table_timeout_secs = 60

# Delay between table readiness checks (milliseconds)
poll_interval_ms = 500

# Extra browser command line flags
chrome_args = []

[schedule]
# Interval between runs: "10m", "1h", "1d", "90s"
interval = "10m"

# Scrape immediately when the schedule starts
run_on_start = true

# Pause between categories (milliseconds)
step_delay_ms = 2000

# Categories in run order
order = ["gauge", "rainfall", "climatology"]

[storage]
# Directory for the *_latest.json snapshot files
data_dir = "./data"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
