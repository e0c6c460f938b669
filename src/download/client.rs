//! HTTP client wrapper for streaming documents to disk.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{COOKIE, USER_AGENT};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::pdf::remove_partial;
use crate::user_agent;

/// One GET request, optionally replaying browser identity.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    url: String,
    user_agent: Option<String>,
    cookie: Option<String>,
    exact_ok: bool,
}

impl FetchRequest {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: None,
            cookie: None,
            exact_ok: false,
        }
    }

    /// Overrides the default tool User-Agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sends a `Cookie` header with the given value.
    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        let cookie = cookie.into();
        self.cookie = (!cookie.is_empty()).then_some(cookie);
        self
    }

    /// Accept only `200 OK`, not any 2xx status.
    #[must_use]
    pub fn require_exact_ok(mut self) -> Self {
        self.exact_ok = true;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// HTTP client for downloading files with streaming support.
///
/// Created once per run and reused for every entry so connections are pooled.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default timeouts (30s connect, 5min read).
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if reqwest rejects the configuration.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeouts(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            Duration::from_secs(READ_TIMEOUT_SECS),
        )
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if reqwest rejects the configuration.
    pub fn with_timeouts(connect: Duration, read: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(connect)
            .timeout(read)
            .gzip(true)
            .user_agent(user_agent::default_download_user_agent())
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self { client })
    }

    /// Fetches `request` and streams the body into `destination`.
    ///
    /// The destination is created (or truncated) only after the server has
    /// answered with an accepted status. If streaming fails, the partial file
    /// is deleted before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns a status the request does not accept
    /// - Writing to disk fails
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn fetch_to_file(
        &self,
        request: &FetchRequest,
        destination: &Path,
    ) -> Result<u64, DownloadError> {
        debug!("starting download");
        let response = self.send(request).await?;

        let file = File::create(destination)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;

        let streamed = stream_to_file(file, response, &request.url, destination).await;
        let bytes = match streamed {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!(path = %destination.display(), "cleaning up partial file after error");
                remove_partial(destination).await;
                return Err(error);
            }
        };

        info!(path = %destination.display(), bytes, "download complete");
        Ok(bytes)
    }

    async fn send(&self, request: &FetchRequest) -> Result<reqwest::Response, DownloadError> {
        Url::parse(&request.url).map_err(|_| DownloadError::invalid_url(&request.url))?;

        let mut builder = self.client.get(&request.url);
        if let Some(agent) = &request.user_agent {
            builder = builder.header(USER_AGENT, agent);
        }
        if let Some(cookie) = &request.cookie {
            builder = builder.header(COOKIE, cookie);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(&request.url, e))?;

        let status = response.status();
        let accepted = if request.exact_ok {
            status == reqwest::StatusCode::OK
        } else {
            status.is_success()
        };
        if !accepted {
            return Err(DownloadError::http_status(&request.url, status.as_u16()));
        }
        Ok(response)
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;
    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_fetch_to_file_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 data".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("key.pdf");
        let client = HttpClient::new().unwrap();
        let bytes = client
            .fetch_to_file(&FetchRequest::new(format!("{}/paper.pdf", server.uri())), &dest)
            .await
            .unwrap();
        assert_eq!(bytes, 13);
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.4 data");
    }

    #[tokio::test]
    async fn test_fetch_to_file_http_error_creates_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("key.pdf");
        let client = HttpClient::new().unwrap();
        let err = client
            .fetch_to_file(&FetchRequest::new(format!("{}/missing", server.uri())), &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::HttpStatus { status: 404, .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_fetch_replays_cookie_and_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("cookie", "cf_clearance=abc"))
            .and(header("user-agent", "Mozilla/5.0 Test"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = FetchRequest::new(server.uri())
            .with_cookie("cf_clearance=abc")
            .with_user_agent("Mozilla/5.0 Test")
            .require_exact_ok();
        HttpClient::new()
            .unwrap()
            .fetch_to_file(&request, &dir.path().join("x.pdf"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_exact_ok_rejects_other_success_codes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(203).set_body_bytes(b"%PDF-".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = FetchRequest::new(server.uri()).require_exact_ok();
        let err = HttpClient::new()
            .unwrap()
            .fetch_to_file(&request, &dir.path().join("x.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::HttpStatus { status: 203, .. }));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.pdf");
        let err = HttpClient::new()
            .unwrap()
            .fetch_to_file(&FetchRequest::new("not a url"), &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl { .. }));
        assert!(!dest.exists());
    }
}
