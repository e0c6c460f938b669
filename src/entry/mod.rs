//! Bibliography entries and the source that yields them.
//!
//! [`EntrySource`] reads a BibTeX bibliography once and yields normalized,
//! immutable [`BibliographyEntry`] values. Operations declare the field they
//! need through [`EntryField`]; entries lacking it are skipped by the caller
//! with a [`MissingFieldError`] warning.

mod bibtex;

pub use bibtex::{BibtexParseResult, BibtexRecord, parse_bibtex, serialize_records};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

#[allow(clippy::expect_used)]
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

const DOI_URL_PREFIXES: [&str; 4] = [
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
];

/// A field an operation may require from an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    Url,
    Doi,
    EprintId,
    Title,
}

impl EntryField {
    /// The BibTeX field name this maps to.
    #[must_use]
    pub fn bibtex_name(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Doi => "doi",
            Self::EprintId => "eprint",
            Self::Title => "title",
        }
    }
}

impl fmt::Display for EntryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bibtex_name())
    }
}

/// An entry lacks a field required by the requested operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("entry `{entry_id}` has no `{field}` field")]
pub struct MissingFieldError {
    /// Identifier of the offending entry.
    pub entry_id: String,
    /// The field that was required.
    pub field: EntryField,
}

/// Errors reading a bibliography file.
#[derive(Debug, Error)]
pub enum EntrySourceError {
    /// The bibliography file could not be read.
    #[error("cannot read bibliography {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// One bibliography record identifying a source article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibliographyEntry {
    id: String,
    url: Option<String>,
    doi: Option<String>,
    eprint_id: Option<String>,
    title: Option<String>,
}

impl BibliographyEntry {
    /// Creates an entry with only an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: None,
            doi: None,
            eprint_id: None,
            title: None,
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = non_empty(url.into());
        self
    }

    #[must_use]
    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = non_empty(normalize_doi(&doi.into()));
        self
    }

    #[must_use]
    pub fn with_eprint_id(mut self, eprint_id: impl Into<String>) -> Self {
        self.eprint_id = non_empty(eprint_id.into());
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = non_empty(collapse_whitespace(&title.into()));
        self
    }

    /// Builds an entry from a parsed BibTeX record.
    #[must_use]
    pub fn from_record(record: &BibtexRecord) -> Self {
        let mut entry = Self::new(record.key.clone());
        if let Some(url) = record.get("url") {
            entry = entry.with_url(url.trim());
        }
        if let Some(doi) = record.get("doi") {
            entry = entry.with_doi(doi);
        }
        if let Some(eprint) = record.get("eprint") {
            entry = entry.with_eprint_id(eprint.trim());
        }
        if let Some(title) = record.get("title") {
            entry = entry.with_title(title);
        }
        entry
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    #[must_use]
    pub fn doi(&self) -> Option<&str> {
        self.doi.as_deref()
    }

    #[must_use]
    pub fn eprint_id(&self) -> Option<&str> {
        self.eprint_id.as_deref()
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Returns the value of a field if present.
    #[must_use]
    pub fn field(&self, field: EntryField) -> Option<&str> {
        match field {
            EntryField::Url => self.url(),
            EntryField::Doi => self.doi(),
            EntryField::EprintId => self.eprint_id(),
            EntryField::Title => self.title(),
        }
    }

    /// Returns the value of a field required by an operation.
    ///
    /// # Errors
    ///
    /// Returns [`MissingFieldError`] when the entry lacks the field.
    pub fn require(&self, field: EntryField) -> Result<&str, MissingFieldError> {
        self.field(field).ok_or_else(|| MissingFieldError {
            entry_id: self.id.clone(),
            field,
        })
    }
}

/// Parsed bibliography, iterated in file order.
#[derive(Debug, Clone, Default)]
pub struct EntrySource {
    entries: Vec<BibliographyEntry>,
    warnings: Vec<String>,
}

impl EntrySource {
    /// Reads and parses a BibTeX bibliography file.
    ///
    /// # Errors
    ///
    /// Returns [`EntrySourceError::Io`] when the file cannot be read.
    pub fn from_path(path: &Path) -> Result<Self, EntrySourceError> {
        let text = std::fs::read_to_string(path).map_err(|source| EntrySourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = Self::from_bibtex(&text);
        debug!(
            path = %path.display(),
            entries = source.len(),
            warnings = source.warnings.len(),
            "bibliography loaded"
        );
        Ok(source)
    }

    /// Parses BibTeX text. Malformed records are kept as warnings.
    #[must_use]
    pub fn from_bibtex(text: &str) -> Self {
        let parsed = parse_bibtex(text);
        for message in &parsed.skipped {
            warn!(reason = %message, "skipping unparsable bibliography record");
        }
        Self {
            entries: parsed
                .records
                .iter()
                .map(BibliographyEntry::from_record)
                .collect(),
            warnings: parsed.skipped,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BibliographyEntry> {
        self.entries.iter()
    }

    /// Entries in file order.
    #[must_use]
    pub fn entries(&self) -> &[BibliographyEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse warnings for records that were dropped.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

impl<'a> IntoIterator for &'a EntrySource {
    type Item = &'a BibliographyEntry;
    type IntoIter = std::slice::Iter<'a, BibliographyEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Strips resolver prefixes so `https://doi.org/10.1/x` becomes `10.1/x`.
fn normalize_doi(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    for prefix in DOI_URL_PREFIXES {
        if lower.starts_with(prefix) {
            return trimmed[prefix.len()..].to_string();
        }
    }
    if lower.starts_with("doi:") {
        return trimmed[4..].trim().to_string();
    }
    trimmed.to_string()
}

fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RUN.replace_all(value.trim(), " ").into_owned()
}

fn non_empty(value: String) -> Option<String> {
    (!value.trim().is_empty()).then_some(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const BIB: &str = r"
@inproceedings{acm1, title={Automated
    Program   Repair}, url={https://dl.acm.org/doi/10.1145/3395363.3397369}}
@article{arx1, title={LLM Repair}, eprint={2403.01234}}
@article{spr1, doi={https://doi.org/10.1007/s10664-023-1}}
@article{bare, year={2020}}
";

    #[test]
    fn test_entry_source_maps_fields() {
        let source = EntrySource::from_bibtex(BIB);
        assert_eq!(source.len(), 4);
        let entries: Vec<_> = source.iter().collect();
        assert_eq!(entries[0].id(), "acm1");
        assert_eq!(
            entries[0].url(),
            Some("https://dl.acm.org/doi/10.1145/3395363.3397369")
        );
        assert_eq!(entries[0].title(), Some("Automated Program Repair"));
        assert_eq!(entries[1].eprint_id(), Some("2403.01234"));
        assert_eq!(entries[2].doi(), Some("10.1007/s10664-023-1"));
    }

    #[test]
    fn test_require_reports_missing_field() {
        let source = EntrySource::from_bibtex(BIB);
        let bare = source.iter().find(|e| e.id() == "bare").unwrap();
        let err = bare.require(EntryField::Url).unwrap_err();
        assert_eq!(err.entry_id, "bare");
        assert_eq!(err.field, EntryField::Url);
        assert!(err.to_string().contains("`url`"));
    }

    #[test]
    fn test_empty_field_value_counts_as_missing() {
        let entry = BibliographyEntry::new("k").with_url("   ");
        assert!(entry.require(EntryField::Url).is_err());
    }

    #[test]
    fn test_normalize_doi_prefixes() {
        assert_eq!(normalize_doi("doi:10.1/x"), "10.1/x");
        assert_eq!(normalize_doi("HTTPS://DOI.ORG/10.1/x"), "10.1/x");
        assert_eq!(normalize_doi("10.1/x"), "10.1/x");
    }

    #[test]
    fn test_from_path_missing_file_is_io_error() {
        let err = EntrySource::from_path(Path::new("/nonexistent/bib.bib")).unwrap_err();
        assert!(matches!(err, EntrySourceError::Io { .. }));
    }
}
