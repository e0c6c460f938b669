//! Classification job: one oracle call per reference line.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;

use super::InputError;
use crate::classify::{Article, OracleClient};
use crate::entry::MissingFieldError;
use crate::outcome::HarvestOutcome;
use crate::output::{OutputError, OutputSink};
use crate::pipeline::HarvestJob;

/// Classified articles, one JSON object per line.
pub const RESULT_FILE: &str = "result.jsonl";
/// Input lines the oracle could not classify, verbatim.
pub const FAILED_LINES: &str = "failed.log";
/// Input lines already classified; read back on startup to resume.
pub const CLASSIFIED_LEDGER: &str = "classified.txt";

/// One non-blank line of a reference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLine {
    /// 1-based line number in the input file.
    pub number: usize,
    pub text: String,
}

/// Reads the non-blank, trimmed lines of a reference list.
///
/// # Errors
///
/// Returns [`InputError`] if the file cannot be read.
pub fn load_reference_lines(path: &Path) -> Result<Vec<ReferenceLine>, InputError> {
    let text = std::fs::read_to_string(path).map_err(|source| InputError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.trim();
            (!line.is_empty()).then(|| ReferenceLine {
                number: index + 1,
                text: line.to_string(),
            })
        })
        .collect())
}

pub struct ClassifyJob {
    oracle: OracleClient,
    done: HashSet<String>,
}

impl ClassifyJob {
    /// `done` holds the lines of [`CLASSIFIED_LEDGER`] from earlier runs.
    #[must_use]
    pub fn new(oracle: OracleClient, done: HashSet<String>) -> Self {
        Self { oracle, done }
    }
}

#[async_trait]
impl HarvestJob for ClassifyJob {
    type Item = ReferenceLine;
    type Payload = Article;

    fn name(&self) -> &'static str {
        "classify"
    }

    fn item_id(&self, item: &ReferenceLine) -> String {
        format!("line {}", item.number)
    }

    fn target(&self, item: &ReferenceLine) -> Result<String, MissingFieldError> {
        Ok(item.text.clone())
    }

    fn is_committed(&self, item: &ReferenceLine, _sink: &OutputSink) -> bool {
        self.done.contains(&item.text)
    }

    async fn harvest(
        &self,
        _item: &ReferenceLine,
        target: &str,
        _sink: &OutputSink,
    ) -> HarvestOutcome<Article> {
        self.oracle.classify(target).await.into()
    }

    async fn commit(
        &self,
        item: &ReferenceLine,
        payload: Article,
        sink: &mut OutputSink,
    ) -> Result<(), OutputError> {
        let line = serde_json::to_string(&payload)
            .map_err(|e| OutputError::io(sink.path_of(RESULT_FILE), std::io::Error::other(e)))?;
        sink.append_lines(RESULT_FILE, &[line]).await?;
        sink.append_lines(CLASSIFIED_LEDGER, std::slice::from_ref(&item.text))
            .await
    }

    async fn record_failure(
        &self,
        item: &ReferenceLine,
        sink: &mut OutputSink,
    ) -> Result<(), OutputError> {
        sink.append_lines(FAILED_LINES, std::slice::from_ref(&item.text))
            .await
    }
}
