//! Domain-based selection of PDF download strategies.
//!
//! [`DomainDispatcher`] looks up the host part of a URL in a static table and
//! runs the matching [`DownloadStrategy`]; unknown domains use
//! [`DownloadStrategy::Direct`]. Whatever the strategy, a failed fetch never
//! leaves a file at the destination.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bibharvest_core::{ChromiumLauncher, DomainDispatcher};
//! use bibharvest_core::download::HttpClient;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = DomainDispatcher::new(HttpClient::new()?, Arc::new(ChromiumLauncher::default()));
//! dispatcher
//!     .fetch("https://arxiv.org/abs/2403.01234", Path::new("out/key.pdf"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod authenticated;
mod direct;
mod doi;
mod error;

pub use direct::arxiv_pdf_url;
pub use doi::{DEFAULT_DOI_FALLBACK_BASE, doi_fallback_url};
pub use error::DispatchError;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::browser::SessionLauncher;
use crate::download::HttpClient;

/// Returns the host part of `url`: the text between the scheme separator (if
/// any) and the next `/`.
///
/// ```
/// use bibharvest_core::domain;
/// assert_eq!(domain("https://dl.acm.org/doi/10.1/x"), "dl.acm.org");
/// assert_eq!(domain("example.com/a/b"), "example.com");
/// ```
#[must_use]
pub fn domain(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split('/').next().unwrap_or(rest)
}

/// One retrieval method for a class of URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStrategy {
    /// Plain GET of the URL.
    Direct,
    /// Rewrite an arXiv abstract URL to its PDF URL, then fetch directly.
    ArxivRedirect,
    /// Pass the site's bot challenge in a browser, then replay its cookies
    /// and user-agent on a plain GET.
    AuthenticatedSession,
    /// Try the DOI URL directly; on failure, fetch the publisher PDF URL
    /// built from the DOI through an authenticated session.
    DoiResolver,
}

impl DownloadStrategy {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::ArxivRedirect => "arxiv",
            Self::AuthenticatedSession => "authenticated",
            Self::DoiResolver => "doi",
        }
    }
}

impl fmt::Display for DownloadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const DEFAULT_ROUTES: [(&str, DownloadStrategy); 3] = [
    ("dl.acm.org", DownloadStrategy::AuthenticatedSession),
    ("arxiv.org", DownloadStrategy::ArxivRedirect),
    ("doi.org", DownloadStrategy::DoiResolver),
];

/// Maps URL domains to download strategies and runs them.
pub struct DomainDispatcher {
    http: HttpClient,
    launcher: Arc<dyn SessionLauncher>,
    routes: Vec<(String, DownloadStrategy)>,
    doi_fallback_base: String,
}

impl DomainDispatcher {
    /// Creates a dispatcher with the default domain table.
    #[must_use]
    pub fn new(http: HttpClient, launcher: Arc<dyn SessionLauncher>) -> Self {
        Self {
            http,
            launcher,
            routes: DEFAULT_ROUTES
                .iter()
                .map(|(domain, strategy)| ((*domain).to_string(), *strategy))
                .collect(),
            doi_fallback_base: DEFAULT_DOI_FALLBACK_BASE.to_string(),
        }
    }

    /// Adds or replaces the strategy for an exact domain.
    #[must_use]
    pub fn with_route(mut self, domain: impl Into<String>, strategy: DownloadStrategy) -> Self {
        let domain = domain.into();
        self.routes.retain(|(existing, _)| *existing != domain);
        self.routes.push((domain, strategy));
        self
    }

    /// Overrides the publisher PDF base used by the DOI fallback.
    #[must_use]
    pub fn with_doi_fallback_base(mut self, base: impl Into<String>) -> Self {
        self.doi_fallback_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// The strategy the table selects for `url`.
    #[must_use]
    pub fn strategy_for(&self, url: &str) -> DownloadStrategy {
        let host = domain(url);
        self.routes
            .iter()
            .find(|(domain, _)| domain == host)
            .map_or(DownloadStrategy::Direct, |(_, strategy)| *strategy)
    }

    /// Downloads the PDF behind `url` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] from the selected strategy; the destination
    /// does not exist afterwards.
    #[instrument(skip(self, destination), fields(strategy = tracing::field::Empty))]
    pub async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, DispatchError> {
        let strategy = self.strategy_for(url);
        tracing::Span::current().record("strategy", strategy.name());
        debug!(%strategy, "dispatching download");
        self.run(strategy, url, destination).await
    }

    /// Runs a specific strategy, bypassing the domain table.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] from the strategy.
    pub async fn run(
        &self,
        strategy: DownloadStrategy,
        url: &str,
        destination: &Path,
    ) -> Result<u64, DispatchError> {
        match strategy {
            DownloadStrategy::Direct => direct::fetch_pdf(&self.http, url, destination).await,
            DownloadStrategy::ArxivRedirect => {
                direct::fetch_pdf(&self.http, &arxiv_pdf_url(url), destination).await
            }
            DownloadStrategy::AuthenticatedSession => {
                authenticated::fetch_pdf(self.launcher.as_ref(), &self.http, url, destination)
                    .await
            }
            DownloadStrategy::DoiResolver => {
                doi::fetch_pdf(
                    self.launcher.as_ref(),
                    &self.http,
                    &self.doi_fallback_base,
                    url,
                    destination,
                )
                .await
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::browser::ChromiumLauncher;

    fn dispatcher() -> DomainDispatcher {
        DomainDispatcher::new(
            HttpClient::new().unwrap(),
            Arc::new(ChromiumLauncher::default()),
        )
    }

    #[test]
    fn test_domain_extraction() {
        assert_eq!(domain("https://dl.acm.org/doi/10.1/x"), "dl.acm.org");
        assert_eq!(domain("example.com/a/b"), "example.com");
        assert_eq!(domain("http://127.0.0.1:8080/p.pdf"), "127.0.0.1:8080");
        assert_eq!(domain("https://arxiv.org"), "arxiv.org");
    }

    #[test]
    fn test_strategy_table() {
        let d = dispatcher();
        assert_eq!(
            d.strategy_for("https://dl.acm.org/doi/10.1145/1"),
            DownloadStrategy::AuthenticatedSession
        );
        assert_eq!(
            d.strategy_for("https://arxiv.org/abs/2403.01234"),
            DownloadStrategy::ArxivRedirect
        );
        assert_eq!(
            d.strategy_for("https://doi.org/10.1145/1"),
            DownloadStrategy::DoiResolver
        );
        assert_eq!(
            d.strategy_for("https://www.usenix.org/paper.pdf"),
            DownloadStrategy::Direct
        );
    }

    #[test]
    fn test_with_route_replaces_existing_domain() {
        let d = dispatcher().with_route("arxiv.org", DownloadStrategy::Direct);
        assert_eq!(
            d.strategy_for("https://arxiv.org/abs/1"),
            DownloadStrategy::Direct
        );
    }
}
