//! DOI URLs: direct first, publisher fallback second.

use std::path::Path;

use tracing::{info, instrument};

use super::{DispatchError, authenticated, direct};
use crate::browser::SessionLauncher;
use crate::download::HttpClient;

/// Publisher PDF endpoint the DOI fallback targets.
pub const DEFAULT_DOI_FALLBACK_BASE: &str = "https://dl.acm.org/doi/pdf";

/// Builds `<base>/<prefix>/<suffix>` from the last two path segments of a DOI URL.
///
/// DOIs whose suffix itself contains `/` are cut to their last segment; the
/// fallback only targets the common two-part form.
///
/// # Errors
///
/// Returns [`DispatchError::InvalidDoi`] when the URL has fewer than two
/// non-empty path segments.
pub fn doi_fallback_url(base: &str, url: &str) -> Result<String, DispatchError> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let segments: Vec<&str> = rest
        .split('/')
        .skip(1)
        .filter(|segment| !segment.is_empty())
        .collect();
    match segments.as_slice() {
        [.., prefix, suffix] => Ok(format!(
            "{}/{prefix}/{suffix}",
            base.trim_end_matches('/')
        )),
        _ => Err(DispatchError::invalid_doi(url)),
    }
}

#[instrument(skip(launcher, http, fallback_base, destination))]
pub(super) async fn fetch_pdf(
    launcher: &dyn SessionLauncher,
    http: &HttpClient,
    fallback_base: &str,
    url: &str,
    destination: &Path,
) -> Result<u64, DispatchError> {
    let fallback = doi_fallback_url(fallback_base, url)?;
    match direct::fetch_pdf(http, url, destination).await {
        Ok(bytes) => Ok(bytes),
        Err(error) => {
            info!(error = %error, fallback = %fallback, "direct DOI fetch failed; trying publisher");
            authenticated::fetch_pdf(launcher, http, &fallback, destination).await
        }
    }
}
