use std::time::Instant;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::{PosmonError, Result};
use crate::scraper::config::ScraperConfig;
use crate::scraper::{Session, SessionManager};

/// Launches one headless Chrome per session using chromiumoxide
pub struct ChromeSessionManager {
    config: ScraperConfig,
}

impl ChromeSessionManager {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .request_timeout(self.config.navigation_timeout());

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg.as_str());
        }

        if !self.config.headless {
            builder = builder.with_head();
        }

        builder
            .build()
            .map_err(|e| PosmonError::Launch(format!("Failed to build browser config: {}", e)))
    }
}

#[async_trait]
impl SessionManager for ChromeSessionManager {
    async fn acquire(&self) -> Result<Box<dyn Session>> {
        let browser_config = self.browser_config()?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            PosmonError::Launch(format!("{}. Is Chrome or Chromium installed and in PATH?", e))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        debug!("Browser session opened");
        Ok(Box::new(ChromeSession {
            browser,
            handler,
            config: self.config.clone(),
        }))
    }
}

/// One Chrome process and its CDP handler task.
///
/// Dropping the session without `release` still stops the handler, and
/// chromiumoxide kills the child process when the `Browser` is dropped.
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    config: ScraperConfig,
}

impl ChromeSession {
    async fn open(&self, url: &str) -> Result<Page> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| PosmonError::Navigation(format!("Failed to create page: {}", e)))?;

        page.set_user_agent(self.config.user_agent.as_str())
            .await
            .map_err(|e| PosmonError::Navigation(format!("Failed to set user agent: {}", e)))?;

        let navigation = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(self.config.navigation_timeout(), navigation).await {
            Ok(Ok(())) => Ok(page),
            Ok(Err(e)) => Err(PosmonError::Navigation(e.to_string())),
            Err(_) => Err(PosmonError::NavigationTimeout(self.config.navigation_timeout_secs)),
        }
    }

    async fn wait_for_selector(&self, page: &Page, selector: &str) -> Result<()> {
        let started = Instant::now();
        let poll = async {
            loop {
                if page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(self.config.poll_interval()).await;
            }
        };

        tokio::time::timeout(self.config.table_timeout(), poll)
            .await
            .map_err(|_| PosmonError::TableTimeout {
                selector: selector.to_string(),
                secs: self.config.table_timeout_secs,
            })?;

        debug!("'{}' ready after {:?}", selector, started.elapsed());
        Ok(())
    }
}

#[async_trait]
impl Session for ChromeSession {
    async fn render(&mut self, url: &str, ready_selector: &str) -> Result<String> {
        let page = self.open(url).await?;
        self.wait_for_selector(&page, ready_selector).await?;

        let html = page
            .content()
            .await
            .map_err(|e| PosmonError::Navigation(format!("Failed to read page content: {}", e)))?;

        if let Err(e) = page.close().await {
            debug!("Failed to close page: {}", e);
        }

        Ok(html)
    }

    async fn release(mut self: Box<Self>) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        self.handler.abort();
        debug!("Browser session released");
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
