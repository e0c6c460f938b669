//! Fetches behind a browser-solved bot challenge.
//!
//! The browser only clears the challenge. Its cookies and user-agent are then
//! replayed on a plain HTTP GET while the session is still open, and the
//! session is closed before the strategy returns.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::DispatchError;
use super::direct::fetch_request;
use crate::browser::{BrowserSession, SessionLauncher, SessionTask, cookie_header, with_session};
use crate::download::{FetchRequest, HttpClient};

struct ReplayFetch<'a> {
    http: &'a HttpClient,
    url: &'a str,
    destination: &'a Path,
}

#[async_trait]
impl SessionTask for ReplayFetch<'_> {
    type Output = Result<u64, DispatchError>;

    async fn run(&self, session: &mut dyn BrowserSession) -> Self::Output {
        let cookies = session.cookies().await?;
        let agent = session.user_agent().await?;
        debug!(cookies = cookies.len(), "replaying browser identity");
        let request = FetchRequest::new(self.url)
            .with_cookie(cookie_header(&cookies))
            .with_user_agent(agent)
            .require_exact_ok();
        fetch_request(self.http, &request, self.destination).await
    }
}

#[instrument(skip(launcher, http, destination))]
pub(super) async fn fetch_pdf(
    launcher: &dyn SessionLauncher,
    http: &HttpClient,
    url: &str,
    destination: &Path,
) -> Result<u64, DispatchError> {
    let task = ReplayFetch {
        http,
        url,
        destination,
    };
    with_session(launcher, url, &task).await?
}
