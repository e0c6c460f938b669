//! Citation export job: `<category>.bib` plus `citations/<title>.bib` per query.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{InputError, title_file_stem};
use crate::classify::{Article, Category};
use crate::entry::{BibtexRecord, EntryField, MissingFieldError, serialize_records};
use crate::outcome::HarvestOutcome;
use crate::output::{OutputError, OutputSink};
use crate::pipeline::HarvestJob;
use crate::scholar::CitationSearchAutomaton;

/// One title to look up and the category file its record goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationQuery {
    pub title: String,
    pub category: Category,
}

/// Reads classified articles (one JSON object per line).
///
/// Unparsable lines are skipped with a warning. Articles classified as
/// irrelevant are dropped unless `include_irrelevant` is set.
///
/// # Errors
///
/// Returns [`InputError`] if the file cannot be read.
pub fn load_citation_queries(
    path: &Path,
    include_irrelevant: bool,
) -> Result<Vec<CitationQuery>, InputError> {
    let text = std::fs::read_to_string(path).map_err(|source| InputError {
        path: path.to_path_buf(),
        source,
    })?;
    let mut queries = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Article>(line) {
            Ok(article) if article.category == Category::Irrelevant && !include_irrelevant => {
                debug!(line = number + 1, title = %article.title, "skipping irrelevant article");
            }
            Ok(article) => queries.push(CitationQuery {
                title: article.title.split_whitespace().collect::<Vec<_>>().join(" "),
                category: article.category,
            }),
            Err(error) => {
                warn!(line = number + 1, error = %error, "skipping unparsable record");
            }
        }
    }
    Ok(queries)
}

/// Looks up each title with the [`CitationSearchAutomaton`].
pub struct CiteJob {
    automaton: CitationSearchAutomaton,
}

impl CiteJob {
    #[must_use]
    pub fn new(automaton: CitationSearchAutomaton) -> Self {
        Self { automaton }
    }

    fn commit_name(query: &CitationQuery) -> String {
        format!("citations/{}.bib", title_file_stem(&query.title))
    }
}

#[async_trait]
impl HarvestJob for CiteJob {
    type Item = CitationQuery;
    type Payload = Vec<BibtexRecord>;

    fn name(&self) -> &'static str {
        "cite"
    }

    fn item_id(&self, item: &CitationQuery) -> String {
        item.title.clone()
    }

    fn target(&self, item: &CitationQuery) -> Result<String, MissingFieldError> {
        if item.title.is_empty() {
            return Err(MissingFieldError {
                entry_id: format!("<untitled {}>", item.category),
                field: EntryField::Title,
            });
        }
        Ok(item.title.clone())
    }

    fn is_committed(&self, item: &CitationQuery, sink: &OutputSink) -> bool {
        sink.exists(Self::commit_name(item))
    }

    async fn harvest(
        &self,
        _item: &CitationQuery,
        target: &str,
        _sink: &OutputSink,
    ) -> HarvestOutcome<Vec<BibtexRecord>> {
        self.automaton.search(target).await
    }

    async fn commit(
        &self,
        item: &CitationQuery,
        payload: Vec<BibtexRecord>,
        sink: &mut OutputSink,
    ) -> Result<(), OutputError> {
        let text = serialize_records(&payload);
        sink.append_raw(&format!("{}.bib", item.category), &format!("{text}\n"))
            .await?;
        sink.commit_file(Self::commit_name(item), text.as_bytes())
            .await
    }

    // A captcha wall looks like zero results, so empty searches count too.
    fn not_found_is_failure(&self) -> bool {
        true
    }
}
