//! Scoped browser automation sessions.
//!
//! A [`BrowserSession`] is one live browser connection positioned on a page.
//! Sessions are only obtained through a [`SessionLauncher`] and only used
//! inside [`with_session`], which closes the session on every exit path of
//! the task before returning, so no two sessions are ever alive at once in a
//! sequential run.

mod chromium;

pub use chromium::{ChromiumLauncher, LaunchOptions};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised by browser automation.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The browser process could not be started.
    #[error("failed to launch browser: {reason}")]
    Launch {
        /// Why the launch failed.
        reason: String,
    },

    /// Navigation to a URL failed or timed out.
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        /// Target URL.
        url: String,
        /// Why navigation failed.
        reason: String,
    },

    /// An injected script threw or its result could not be decoded.
    #[error("script execution failed: {reason}")]
    Script {
        /// Why the script failed.
        reason: String,
    },

    /// Any other protocol failure (cookies, page source, close).
    #[error("browser protocol error: {reason}")]
    Protocol {
        /// What went wrong.
        reason: String,
    },
}

impl BrowserError {
    pub fn launch(reason: impl Into<String>) -> Self {
        Self::Launch {
            reason: reason.into(),
        }
    }

    pub fn navigation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn script(reason: impl Into<String>) -> Self {
        Self::Script {
            reason: reason.into(),
        }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }
}

/// A cookie read from the live page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

/// Renders cookies as a `Cookie` request header value.
#[must_use]
pub fn cookie_header(cookies: &[BrowserCookie]) -> String {
    cookies
        .iter()
        .map(|cookie| format!("{}={}", cookie.name, cookie.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// One live browser connection.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigates the page and waits for the navigation (and any bot
    /// challenge settle time) to complete.
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Evaluates a script expression against the current page and returns
    /// its JSON value (`Null` for `null`/`undefined`).
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Full HTML source of the current page.
    async fn page_source(&mut self) -> Result<String, BrowserError>;

    /// Cookies visible to the current page.
    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, BrowserError>;

    /// The browser's `navigator.userAgent`.
    async fn user_agent(&mut self) -> Result<String, BrowserError> {
        match self.evaluate("navigator.userAgent").await? {
            serde_json::Value::String(agent) => Ok(agent),
            other => Err(BrowserError::script(format!(
                "navigator.userAgent returned {other}"
            ))),
        }
    }

    /// Releases the browser. Called exactly once, by [`with_session`].
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

/// Opens sessions already navigated to a start URL.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// Starts a browser and navigates it to `url`.
    async fn open(&self, url: &str) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// Work performed against an open session.
#[async_trait]
pub trait SessionTask: Sync {
    type Output: Send;

    async fn run(&self, session: &mut dyn BrowserSession) -> Self::Output;
}

/// Opens a session on `url`, runs `task` against it and closes it.
///
/// The session is closed whatever the task returns; a failed close is logged
/// and does not replace the task's output.
///
/// # Errors
///
/// Returns [`BrowserError`] only when the session could not be opened.
pub async fn with_session<T>(
    launcher: &dyn SessionLauncher,
    url: &str,
    task: &T,
) -> Result<T::Output, BrowserError>
where
    T: SessionTask + ?Sized,
{
    let mut session = launcher.open(url).await?;
    debug!(url, "browser session opened");
    let output = task.run(session.as_mut()).await;
    if let Err(error) = session.close().await {
        warn!(url, error = %error, "browser session did not close cleanly");
    } else {
        debug!(url, "browser session closed");
    }
    Ok(output)
}

/// Decodes a script result that is either `null` or a string.
///
/// # Errors
///
/// Returns [`BrowserError::Script`] for any other JSON type.
pub fn optional_string(value: serde_json::Value) -> Result<Option<String>, BrowserError> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(text) => Ok(Some(text)),
        other => Err(BrowserError::script(format!(
            "expected string or null, got {other}"
        ))),
    }
}
