//! Plain fetches with PDF validation, and the arXiv URL rewrite.

use std::path::Path;

use tracing::{debug, warn};

use super::DispatchError;
use crate::download::{FetchRequest, HttpClient, remove_partial, sniff_pdf};

/// Rewrites an arXiv abstract URL (`/abs/<id>`) to its PDF URL (`/pdf/<id>`).
///
/// Only the first occurrence is replaced; other URLs are returned unchanged.
#[must_use]
pub fn arxiv_pdf_url(url: &str) -> String {
    url.replacen("/abs/", "/pdf/", 1)
}

/// GETs `url` into `destination` and keeps the file only if it is a PDF.
pub(super) async fn fetch_pdf(
    http: &HttpClient,
    url: &str,
    destination: &Path,
) -> Result<u64, DispatchError> {
    fetch_request(http, &FetchRequest::new(url), destination).await
}

/// Runs `request` and validates the result, deleting the file on any failure.
pub(super) async fn fetch_request(
    http: &HttpClient,
    request: &FetchRequest,
    destination: &Path,
) -> Result<u64, DispatchError> {
    let bytes = match http.fetch_to_file(request, destination).await {
        Ok(bytes) => bytes,
        Err(error) => {
            remove_partial(destination).await;
            return Err(error.into());
        }
    };
    match sniff_pdf(destination).await {
        Ok(true) => {
            debug!(url = request.url(), bytes, "PDF validated");
            Ok(bytes)
        }
        Ok(false) => {
            warn!(url = request.url(), "fetched content is not a PDF; discarding");
            remove_partial(destination).await;
            Err(DispatchError::format(request.url()))
        }
        Err(source) => {
            remove_partial(destination).await;
            Err(DispatchError::Inspect {
                path: destination.to_path_buf(),
                source,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_arxiv_pdf_url_rewrites_abstract_path() {
        assert_eq!(
            arxiv_pdf_url("https://arxiv.org/abs/2403.01234"),
            "https://arxiv.org/pdf/2403.01234"
        );
        assert_eq!(
            arxiv_pdf_url("https://arxiv.org/pdf/2403.01234"),
            "https://arxiv.org/pdf/2403.01234"
        );
    }

    #[tokio::test]
    async fn test_fetch_pdf_discards_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_string("<html>Sign in</html>"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("key.pdf");
        let err = fetch_pdf(
            &HttpClient::new().unwrap(),
            &format!("{}/paper", server.uri()),
            &dest,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DispatchError::Format { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_fetch_pdf_keeps_pdf_served_as_octet_stream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .set_body_bytes(b"%PDF-1.7\n%binary".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("key.pdf");
        fetch_pdf(&HttpClient::new().unwrap(), &server.uri(), &dest)
            .await
            .unwrap();
        assert!(dest.exists());
    }
}
