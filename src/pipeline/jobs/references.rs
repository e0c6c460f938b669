//! Reference-list job: `<site>.txt` plus `<site>/<id>.txt` per entry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::entry_file_stem;
use crate::browser::{BrowserSession, SessionLauncher, SessionTask, with_session};
use crate::entry::{BibliographyEntry, MissingFieldError};
use crate::extract::{ExtractError, ReferenceExtractor, SiteVariant};
use crate::outcome::HarvestOutcome;
use crate::output::{FailureKind, FailureRecord, OutputError, OutputSink};
use crate::pipeline::HarvestJob;

/// Pause between reading references and reading the cited-by list.
pub const DEFAULT_CITED_BY_SETTLE: Duration = Duration::from_secs(2);

/// What one article page yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceHarvest {
    /// Article page the lists were read from.
    pub url: String,
    /// References in document order.
    pub references: Vec<String>,
    /// The cited-by list when requested; `Err` holds why it failed.
    pub cited_by: Option<Result<Vec<String>, String>>,
}

/// Extracts reference lists for one [`SiteVariant`].
pub struct ReferencesJob {
    launcher: Arc<dyn SessionLauncher>,
    extractor: ReferenceExtractor,
    cited_by: bool,
    cited_by_settle: Duration,
}

impl ReferencesJob {
    #[must_use]
    pub fn new(launcher: Arc<dyn SessionLauncher>, site: SiteVariant) -> Self {
        Self {
            launcher,
            extractor: ReferenceExtractor::new(site),
            cited_by: false,
            cited_by_settle: DEFAULT_CITED_BY_SETTLE,
        }
    }

    /// Also collect the cited-by list on sites that have one.
    #[must_use]
    pub fn with_cited_by(mut self, enabled: bool, settle: Duration) -> Self {
        self.cited_by = enabled && self.extractor.variant().has_cited_by();
        self.cited_by_settle = settle;
        self
    }

    fn site(&self) -> SiteVariant {
        self.extractor.variant()
    }

    fn commit_name(&self, entry: &BibliographyEntry) -> String {
        format!("{}/{}.txt", self.site(), entry_file_stem(entry.id()))
    }
}

struct ReadLists<'a> {
    job: &'a ReferencesJob,
    url: &'a str,
}

#[async_trait]
impl SessionTask for ReadLists<'_> {
    type Output = Result<ReferenceHarvest, ExtractError>;

    async fn run(&self, session: &mut dyn BrowserSession) -> Self::Output {
        let references = self.job.extractor.collect(session).await?;
        let cited_by = if self.job.cited_by {
            tokio::time::sleep(self.job.cited_by_settle).await;
            Some(
                self.job
                    .extractor
                    .cited_by(session)
                    .await
                    .map_err(|e| e.to_string()),
            )
        } else {
            None
        };
        Ok(ReferenceHarvest {
            url: self.url.to_string(),
            references,
            cited_by,
        })
    }
}

#[async_trait]
impl HarvestJob for ReferencesJob {
    type Item = BibliographyEntry;
    type Payload = ReferenceHarvest;

    fn name(&self) -> &'static str {
        "references"
    }

    fn item_id(&self, item: &BibliographyEntry) -> String {
        item.id().to_string()
    }

    fn target(&self, item: &BibliographyEntry) -> Result<String, MissingFieldError> {
        self.site().article_url(item)
    }

    fn is_committed(&self, item: &BibliographyEntry, sink: &OutputSink) -> bool {
        sink.exists(self.commit_name(item))
    }

    async fn harvest(
        &self,
        _item: &BibliographyEntry,
        target: &str,
        _sink: &OutputSink,
    ) -> HarvestOutcome<ReferenceHarvest> {
        let task = ReadLists { job: self, url: target };
        let harvest = match with_session(self.launcher.as_ref(), target, &task).await {
            Ok(Ok(harvest)) => harvest,
            Ok(Err(error)) => return HarvestOutcome::error(error),
            Err(error) => return HarvestOutcome::error(error),
        };
        let cited_by_found = matches!(&harvest.cited_by, Some(Ok(list)) if !list.is_empty());
        if harvest.references.is_empty() && !cited_by_found {
            if let Some(Err(reason)) = &harvest.cited_by {
                return HarvestOutcome::Error(format!("no references; cited-by failed: {reason}"));
            }
            return HarvestOutcome::NotFound;
        }
        let cited_by = harvest
            .cited_by
            .as_ref()
            .and_then(|list| list.as_ref().ok())
            .map_or(0, Vec::len);
        debug!(references = harvest.references.len(), cited_by, "lists read");
        HarvestOutcome::Success(harvest)
    }

    async fn commit(
        &self,
        item: &BibliographyEntry,
        payload: ReferenceHarvest,
        sink: &mut OutputSink,
    ) -> Result<(), OutputError> {
        let mut lines = payload.references;
        match payload.cited_by {
            Some(Ok(cited_by)) => lines.extend(cited_by),
            Some(Err(reason)) => {
                warn!(
                    entry = %item.id(),
                    reason = %reason,
                    "cited-by list failed; keeping references"
                );
                sink.log_failure(&FailureRecord::now(
                    FailureKind::Error,
                    item.id(),
                    &payload.url,
                    format!("cited-by: {reason}"),
                ))
                .await?;
            }
            None => {}
        }

        sink.append_lines(&format!("{}.txt", self.site()), &lines).await?;
        let mut body = lines.join("\n");
        body.push('\n');
        sink.commit_file(self.commit_name(item), body.as_bytes()).await
    }

    fn not_found_reason(&self, id: &str) -> String {
        format!("No reference: {id}")
    }
}
