//! Chromium-backed sessions using chromiumoxide.
//!
//! Every [`ChromiumLauncher::open`] starts a fresh browser process so that no
//! cookies or challenge state leak between entries.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use super::{BrowserCookie, BrowserError, BrowserSession, SessionLauncher};

/// Environment variable naming the browser executable.
pub const CHROME_PATH_ENV: &str = "BIBHARVEST_CHROME";

const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// How browsers are started and how long pages are given to settle.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Browser executable; `None` lets chromiumoxide auto-detect.
    pub executable: Option<PathBuf>,
    /// Show a browser window. Some bot challenges only resolve headful.
    pub headful: bool,
    /// Upper bound for a single navigation.
    pub navigation_timeout: Duration,
    /// Wait after each navigation so bot challenges can resolve.
    pub settle: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            executable: std::env::var_os(CHROME_PATH_ENV).map(PathBuf::from),
            headful: false,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            settle: Duration::ZERO,
        }
    }
}

/// Launches one Chromium process per session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    options: LaunchOptions,
}

impl ChromiumLauncher {
    #[must_use]
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self) -> Result<BrowserConfig, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled");
        if self.options.headful {
            builder = builder.with_head();
        } else {
            builder = builder.arg("--headless=new");
        }
        if let Some(path) = &self.options.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(BrowserError::launch)
    }
}

#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    #[instrument(skip(self))]
    async fn open(&self, url: &str) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(error) => {
                handler_task.abort();
                return Err(BrowserError::launch(format!("failed to open page: {error}")));
            }
        };

        let mut session = ChromiumSession {
            browser,
            page,
            handler_task,
            options: self.options.clone(),
        };
        if let Err(error) = session.navigate(url).await {
            let _ = Box::new(session).close().await;
            return Err(error);
        }
        Ok(Box::new(session))
    }
}

struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    options: LaunchOptions,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let timeout = self.options.navigation_timeout;
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(error)) => return Err(BrowserError::navigation(url, error.to_string())),
            Err(_) => {
                return Err(BrowserError::navigation(
                    url,
                    format!("timed out after {}s", timeout.as_secs()),
                ));
            }
        }
        // Challenge pages redirect once resolved; a failed wait is not fatal.
        let _ = tokio::time::timeout(timeout, self.page.wait_for_navigation()).await;
        if !self.options.settle.is_zero() {
            debug!(url, settle_ms = self.options.settle.as_millis(), "waiting for page to settle");
            tokio::time::sleep(self.options.settle).await;
        }
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::protocol(format!("failed to read page source: {e}")))
    }

    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, BrowserError> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| BrowserError::protocol(format!("failed to read cookies: {e}")))?;
        Ok(cookies
            .into_iter()
            .map(|cookie| BrowserCookie {
                name: cookie.name,
                value: cookie.value,
                domain: cookie.domain,
            })
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        let mut this = self;
        let _ = this.page.clone().close().await;
        let closed = this
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::protocol(format!("failed to close browser: {e}")));
        let _ = this.browser.wait().await;
        closed
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}
