//! Browser-based extraction of the station tables.
//!
//! # Architecture
//!
//! ```text
//! SessionManager → Session (one headless browser) → rendered HTML
//!     → TableExtractor (ColumnSchema + cleanup rules) → StationRecords
//! ```
//!
//! A session lives for exactly one category's extraction and is released on
//! every exit path, so repeated scheduled runs do not leak browser processes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use posmon::scraper::{ChromeSessionManager, ScraperConfig, TableExtractor};
//!
//! let sessions = ChromeSessionManager::new(ScraperConfig::default());
//! let records = TableExtractor::new(Category::Rainfall)
//!     .scrape(&sessions, &config.source_url)
//!     .await?;
//! ```

mod chrome;
pub mod cleanup;
mod config;
mod extractor;
pub mod schema;

pub use chrome::{ChromeSession, ChromeSessionManager};
pub use config::ScraperConfig;
pub use extractor::TableExtractor;

use async_trait::async_trait;

use crate::app::Result;

/// Opens browser sessions.
///
/// Failing to launch is a hard failure for the current attempt; managers do
/// not retry internally.
#[async_trait]
pub trait SessionManager: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn Session>>;
}

/// One browser process with one page
#[async_trait]
pub trait Session: Send {
    /// Navigate to `url`, wait until `ready_selector` matches and return the
    /// rendered document
    async fn render(&mut self, url: &str, ready_selector: &str) -> Result<String>;

    /// Close the page and terminate the browser process
    async fn release(self: Box<Self>);
}

/// Render one page in a fresh session, releasing the session whether or not
/// rendering succeeded
pub async fn render_page(sessions: &dyn SessionManager, url: &str, ready_selector: &str) -> Result<String> {
    let mut session = sessions.acquire().await?;
    let rendered = session.render(url, ready_selector).await;
    session.release().await;
    rendered
}
