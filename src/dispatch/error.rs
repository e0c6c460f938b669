//! Error types for download dispatch.

use std::path::PathBuf;

use thiserror::Error;

use crate::browser::BrowserError;
use crate::download::DownloadError;

/// Errors raised by a [`DownloadStrategy`](super::DownloadStrategy).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Transport, HTTP status or disk failure while fetching.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The browser session needed for an authenticated fetch failed.
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// The fetched bytes are not a PDF; the file was discarded.
    #[error("content from {url} is not a PDF")]
    Format {
        /// Where the bytes came from.
        url: String,
    },

    /// A DOI URL does not carry at least two path segments.
    #[error("invalid DOI URL {url}: expected at least two path segments")]
    InvalidDoi {
        /// The offending URL.
        url: String,
    },

    /// The fetched file could not be inspected.
    #[error("cannot inspect downloaded file {path}: {source}")]
    Inspect {
        /// The downloaded file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DispatchError {
    pub fn format(url: impl Into<String>) -> Self {
        Self::Format { url: url.into() }
    }

    pub fn invalid_doi(url: impl Into<String>) -> Self {
        Self::InvalidDoi { url: url.into() }
    }
}
