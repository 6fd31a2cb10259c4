use crate::error::{BrowserError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use sitesense_core::BrowserConfig;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Browser automation engine.
///
/// Each render or audit launches its own browser session so concurrent scans
/// never share page state.
#[derive(Debug, Clone)]
pub struct BrowserEngine {
    config: BrowserConfig,
}

/// A launched browser and the task driving its CDP handler.
pub(crate) struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserEngine {
    /// Create an engine; no browser is started until a session is needed.
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    /// Settings the engine was created with.
    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Navigation budget for a single page load.
    pub(crate) fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.config.navigation_timeout_secs)
    }

    pub(crate) async fn launch(&self) -> Result<BrowserSession> {
        let mut builder = CdpBrowserConfig::builder()
            .no_sandbox()
            .window_size(self.config.window_width, self.config.window_height)
            .viewport(Viewport {
                width: self.config.window_width,
                height: self.config.window_height,
                ..Viewport::default()
            })
            .request_timeout(self.navigation_timeout());

        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config).await?;

        // Spawn browser handler
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::debug!("Browser session launched");
        Ok(BrowserSession { browser, handler })
    }
}

impl BrowserSession {
    pub(crate) async fn new_page(&self) -> Result<Page> {
        Ok(self.browser.new_page("about:blank").await?)
    }

    /// Close the browser; failures are logged since the result is already captured.
    pub(crate) async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser cleanly: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}
