//! Citation lookup through a search engine's "cite" dialog.
//!
//! [`CitationSearchAutomaton::search`] runs one query through five stages in a
//! single browser session:
//!
//! 1. **Search**: open the percent-encoded query URL.
//! 2. **LocateResult**: find the first organic result, else `NotFound`.
//! 3. **ExtractMetadata**: read its abstract snippet and link (both optional).
//! 4. **RequestExport**: click its "cite" control, then wait for the dialog.
//! 5. **FetchAndParse**: follow the BibTeX export link and parse the record,
//!    from a `<pre>` block if the page has one, else from the whole page.
//!
//! There is no retry. The session is closed on every terminal path.

mod scripts;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::browser::{BrowserError, BrowserSession, SessionLauncher, SessionTask, with_session};
use crate::entry::{BibtexRecord, parse_bibtex};
use crate::outcome::HarvestOutcome;

/// Default search URL; `{query}` is replaced by the percent-encoded query.
pub const DEFAULT_SEARCH_TEMPLATE: &str =
    "https://scholar.google.com/scholar?hl=en&as_sdt=0%2C5&q={query}&oq=";

/// Default wait between requesting the export and reading its link.
pub const DEFAULT_EXPORT_SETTLE: Duration = Duration::from_secs(7);

/// The five stages of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    Search,
    LocateResult,
    ExtractMetadata,
    RequestExport,
    FetchAndParse,
}

impl fmt::Display for SearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Search => "search",
            Self::LocateResult => "locate-result",
            Self::ExtractMetadata => "extract-metadata",
            Self::RequestExport => "request-export",
            Self::FetchAndParse => "fetch-and-parse",
        })
    }
}

/// A stage failed in a way that is not a legitimate "no result".
#[derive(Debug, Error)]
pub enum ScholarError {
    /// The browser failed during a stage.
    #[error("{stage}: {source}")]
    Browser {
        /// Stage that failed.
        stage: SearchStage,
        /// The underlying browser error.
        #[source]
        source: BrowserError,
    },

    /// The located result disappeared before its metadata was read.
    #[error("{stage}: result node vanished after it was located")]
    ResultVanished {
        /// Stage that noticed.
        stage: SearchStage,
    },

    /// A script returned a value of the wrong shape.
    #[error("{stage}: unexpected script result: {reason}")]
    Decode {
        /// Stage that failed.
        stage: SearchStage,
        /// What was wrong.
        reason: String,
    },
}

impl ScholarError {
    fn browser(stage: SearchStage) -> impl FnOnce(BrowserError) -> Self {
        move |source| Self::Browser { stage, source }
    }
}

/// Tunables for [`CitationSearchAutomaton`].
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Search URL with a `{query}` placeholder.
    pub template: String,
    /// Wait after requesting the export.
    pub export_settle: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            template: DEFAULT_SEARCH_TEMPLATE.to_string(),
            export_settle: DEFAULT_EXPORT_SETTLE,
        }
    }
}

/// Drives a search page to a parsed citation record.
pub struct CitationSearchAutomaton {
    launcher: Arc<dyn SessionLauncher>,
    settings: SearchSettings,
}

#[derive(Debug, Default, Deserialize)]
struct ResultMetadata {
    #[serde(rename = "abstract")]
    snippet: Option<String>,
    url: Option<String>,
}

impl CitationSearchAutomaton {
    #[must_use]
    pub fn new(launcher: Arc<dyn SessionLauncher>, settings: SearchSettings) -> Self {
        Self { launcher, settings }
    }

    /// Search URL for `query`. Line breaks are dropped and whitespace runs
    /// collapse to one space before percent-encoding.
    #[must_use]
    pub fn query_url(&self, query: &str) -> String {
        let cleaned = query.split_whitespace().collect::<Vec<_>>().join(" ");
        self.settings
            .template
            .replace("{query}", &urlencoding::encode(&cleaned))
    }

    /// Runs the five stages for `query`.
    ///
    /// Returns `Success` with at least one record, `NotFound` when any stage
    /// legitimately comes up empty, and `Error` otherwise.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> HarvestOutcome<Vec<BibtexRecord>> {
        let url = self.query_url(query);
        let task = SearchTask {
            settle: self.settings.export_settle,
        };
        match with_session(self.launcher.as_ref(), &url, &task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(error)) => HarvestOutcome::error(error),
            Err(error) => HarvestOutcome::error(ScholarError::browser(SearchStage::Search)(error)),
        }
    }
}

struct SearchTask {
    settle: Duration,
}

#[async_trait]
impl SessionTask for SearchTask {
    type Output = Result<HarvestOutcome<Vec<BibtexRecord>>, ScholarError>;

    async fn run(&self, session: &mut dyn BrowserSession) -> Self::Output {
        let stage = SearchStage::LocateResult;
        let found = session
            .evaluate(&scripts::locate_result())
            .await
            .map_err(ScholarError::browser(stage))?;
        if found != serde_json::Value::Bool(true) {
            debug!(%stage, "no organic result");
            return Ok(HarvestOutcome::NotFound);
        }

        let stage = SearchStage::ExtractMetadata;
        let value = session
            .evaluate(&scripts::extract_metadata())
            .await
            .map_err(ScholarError::browser(stage))?;
        if value.is_null() {
            return Err(ScholarError::ResultVanished { stage });
        }
        let metadata: ResultMetadata =
            serde_json::from_value(value).map_err(|e| ScholarError::Decode {
                stage,
                reason: e.to_string(),
            })?;

        let stage = SearchStage::RequestExport;
        let requested = session
            .evaluate(&scripts::request_export())
            .await
            .map_err(ScholarError::browser(stage))?;
        match requested {
            serde_json::Value::Null => {
                debug!(%stage, "result vanished before export");
                return Ok(HarvestOutcome::NotFound);
            }
            serde_json::Value::Bool(false) => debug!(%stage, "result has no cite control"),
            _ => {}
        }
        tokio::time::sleep(self.settle).await;

        let stage = SearchStage::FetchAndParse;
        let export = session
            .evaluate(&scripts::export_url())
            .await
            .map_err(ScholarError::browser(stage))?;
        let Some(export_url) = crate::browser::optional_string(export)
            .map_err(ScholarError::browser(stage))?
            .filter(|href| !href.is_empty())
        else {
            debug!(%stage, "no BibTeX export link");
            return Ok(HarvestOutcome::NotFound);
        };
        session
            .navigate(&export_url)
            .await
            .map_err(ScholarError::browser(stage))?;
        let source = session
            .page_source()
            .await
            .map_err(ScholarError::browser(stage))?;

        let mut records = parse_export_page(&source);
        let count = records.len();
        let Some(first) = records.first_mut() else {
            debug!(%stage, "export page holds no record");
            return Ok(HarvestOutcome::NotFound);
        };
        merge_metadata(first, metadata.snippet.as_deref(), metadata.url.as_deref());
        info!(key = %first.key, records = count, "citation exported");
        Ok(HarvestOutcome::Success(records))
    }
}

/// Parses the records on an export page: the first `<pre>` block if present,
/// else the whole page as raw BibTeX.
#[must_use]
pub fn parse_export_page(source: &str) -> Vec<BibtexRecord> {
    let document = Html::parse_document(source);
    let block = Selector::parse("pre").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .map(|pre| pre.text().collect::<String>())
    });
    match block {
        Some(text) => parse_bibtex(&text).records,
        None => parse_bibtex(source).records,
    }
}

/// Adds a non-empty abstract and URL to `record` where it has none.
pub fn merge_metadata(record: &mut BibtexRecord, snippet: Option<&str>, url: Option<&str>) {
    if let Some(snippet) = snippet.map(str::trim).filter(|s| !s.is_empty()) {
        record.set_if_absent("abstract", snippet);
    }
    if let Some(url) = url.map(str::trim).filter(|s| !s.is_empty()) {
        record.set_if_absent("url", url);
    }
}
