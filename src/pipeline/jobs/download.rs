//! PDF download job: `<output>/<id>.pdf` per entry.

use std::path::PathBuf;

use async_trait::async_trait;

use super::entry_file_stem;
use crate::dispatch::DomainDispatcher;
use crate::entry::{BibliographyEntry, EntryField, MissingFieldError};
use crate::outcome::HarvestOutcome;
use crate::output::{OutputError, OutputSink, staging_path};
use crate::pipeline::HarvestJob;

/// Downloads each entry's `url` through the [`DomainDispatcher`].
///
/// Bytes land in `<id>.pdf.part` and are renamed to `<id>.pdf` only after
/// validation, so an existing `<id>.pdf` is always complete.
pub struct DownloadJob {
    dispatcher: DomainDispatcher,
}

impl DownloadJob {
    #[must_use]
    pub fn new(dispatcher: DomainDispatcher) -> Self {
        Self { dispatcher }
    }

    fn pdf_name(entry: &BibliographyEntry) -> String {
        format!("{}.pdf", entry_file_stem(entry.id()))
    }
}

#[async_trait]
impl HarvestJob for DownloadJob {
    type Item = BibliographyEntry;
    type Payload = PathBuf;

    fn name(&self) -> &'static str {
        "download"
    }

    fn item_id(&self, item: &BibliographyEntry) -> String {
        item.id().to_string()
    }

    fn target(&self, item: &BibliographyEntry) -> Result<String, MissingFieldError> {
        item.require(EntryField::Url).map(str::to_string)
    }

    fn is_committed(&self, item: &BibliographyEntry, sink: &OutputSink) -> bool {
        sink.exists(Self::pdf_name(item))
    }

    async fn harvest(
        &self,
        item: &BibliographyEntry,
        target: &str,
        sink: &OutputSink,
    ) -> HarvestOutcome<PathBuf> {
        let staging = staging_path(&sink.path_of(Self::pdf_name(item)));
        self.dispatcher
            .fetch(target, &staging)
            .await
            .map(|_| staging)
            .into()
    }

    async fn commit(
        &self,
        item: &BibliographyEntry,
        payload: PathBuf,
        sink: &mut OutputSink,
    ) -> Result<(), OutputError> {
        let target = sink.path_of(Self::pdf_name(item));
        sink.promote(&payload, &target).await
    }
}
