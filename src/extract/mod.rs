//! Reference-list extraction from publisher article pages.
//!
//! A [`ReferenceExtractor`] walks the numbered reference elements of an
//! article page through a [`ReferenceCursor`]: index 1, 2, 3, ... until the
//! first index whose element is absent. Sites differ in how elements are
//! named and in what an empty-but-present element means; both are fixed per
//! [`SiteVariant`].

mod scripts;

use std::fmt;

use thiserror::Error;
use tracing::{debug, instrument, trace};

use crate::browser::{BrowserError, BrowserSession, optional_string};
use crate::entry::{BibliographyEntry, EntryField, MissingFieldError};

/// Extraction failed partway; any references already read are discarded.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The browser failed while reading reference `index`.
    #[error("reading reference {index} failed: {source}")]
    Browser {
        /// Cursor position of the failed read.
        index: usize,
        /// The underlying browser error.
        #[source]
        source: BrowserError,
    },

    /// The cited-by list could not be read.
    #[error("reading cited-by list failed: {source}")]
    CitedBy {
        /// The underlying browser error.
        #[source]
        source: BrowserError,
    },
}

/// What an element that exists but has no text means for enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyRule {
    /// Stop, as if the element were absent.
    Terminate,
    /// Emit an empty reference and continue.
    EmitBlank,
    /// Continue without emitting anything.
    Skip,
}

/// Publishers with a known reference-list layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SiteVariant {
    /// ACM Digital Library article pages.
    Acm,
    /// arXiv HTML renderings.
    Arxiv,
    /// Springer Link article pages.
    Springer,
}

impl SiteVariant {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Acm => "acm",
            Self::Arxiv => "arxiv",
            Self::Springer => "springer",
        }
    }

    /// The entry field the article URL is derived from.
    #[must_use]
    pub fn required_field(self) -> EntryField {
        match self {
            Self::Acm => EntryField::Url,
            Self::Arxiv => EntryField::EprintId,
            Self::Springer => EntryField::Doi,
        }
    }

    /// Article page to open for `entry`.
    ///
    /// # Errors
    ///
    /// Returns [`MissingFieldError`] when the entry lacks
    /// [`required_field`](Self::required_field).
    pub fn article_url(self, entry: &BibliographyEntry) -> Result<String, MissingFieldError> {
        let value = entry.require(self.required_field())?;
        Ok(match self {
            Self::Acm => value.to_string(),
            Self::Arxiv => format!("https://arxiv.org/html/{value}"),
            Self::Springer => format!("https://link.springer.com/article/{value}"),
        })
    }

    #[must_use]
    pub fn empty_rule(self) -> EmptyRule {
        match self {
            Self::Acm => EmptyRule::EmitBlank,
            Self::Arxiv => EmptyRule::Skip,
            Self::Springer => EmptyRule::Terminate,
        }
    }

    /// Whether this site also exposes a "cited by" list.
    #[must_use]
    pub fn has_cited_by(self) -> bool {
        matches!(self, Self::Acm)
    }

    fn item_script(self, index: usize) -> String {
        match self {
            Self::Acm => scripts::acm_reference(index),
            Self::Arxiv => scripts::arxiv_reference(index),
            Self::Springer => scripts::springer_reference(index),
        }
    }

    /// Collapses newlines, replaces arXiv's back-link arrow and trims.
    #[must_use]
    pub fn normalize(self, raw: &str) -> String {
        let flat = raw.replace('\n', " ");
        let flat = match self {
            Self::Arxiv => flat.replacen('\u{2191}', ";", 1),
            Self::Acm | Self::Springer => flat,
        };
        flat.trim().to_string()
    }
}

impl fmt::Display for SiteVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extracts reference lists for one site.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceExtractor {
    variant: SiteVariant,
}

impl ReferenceExtractor {
    #[must_use]
    pub fn new(variant: SiteVariant) -> Self {
        Self { variant }
    }

    #[must_use]
    pub fn variant(&self) -> SiteVariant {
        self.variant
    }

    /// A fresh cursor over the page the session is positioned on.
    pub fn references<'s>(&self, session: &'s mut dyn BrowserSession) -> ReferenceCursor<'s> {
        ReferenceCursor {
            session,
            variant: self.variant,
            next_index: 1,
            finished: false,
        }
    }

    /// Reads the whole reference list in document order.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] on the first browser failure; nothing read so
    /// far is returned.
    #[instrument(skip(self, session), fields(site = %self.variant))]
    pub async fn collect(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<Vec<String>, ExtractError> {
        let mut cursor = self.references(session);
        let mut references = Vec::new();
        while let Some(reference) = cursor.next_reference().await? {
            references.push(reference);
        }
        debug!(count = references.len(), "reference list extracted");
        Ok(references)
    }

    /// Reads the ACM "cited by" list. Blank items are dropped; a missing list
    /// is an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::CitedBy`] if the script fails or returns
    /// something other than an array of strings.
    pub async fn cited_by(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<Vec<String>, ExtractError> {
        let value = session
            .evaluate(scripts::ACM_CITED_BY)
            .await
            .map_err(|source| ExtractError::CitedBy { source })?;
        let items: Option<Vec<String>> = serde_json::from_value(value).map_err(|e| {
            ExtractError::CitedBy {
                source: BrowserError::script(format!("unexpected cited-by result: {e}")),
            }
        })?;
        Ok(items
            .unwrap_or_default()
            .into_iter()
            .map(|item| self.variant.normalize(&item))
            .filter(|item| !item.is_empty())
            .collect())
    }
}

/// Lazy walk over numbered reference elements.
///
/// Starts at index 1, never revisits an index, and stays finished once an
/// absent element (or a terminating empty one) has been seen.
pub struct ReferenceCursor<'s> {
    session: &'s mut dyn BrowserSession,
    variant: SiteVariant,
    next_index: usize,
    finished: bool,
}

impl ReferenceCursor<'_> {
    /// Next reference, or `None` once enumeration has ended.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Browser`] if reading an element fails. The
    /// cursor is finished afterwards.
    pub async fn next_reference(&mut self) -> Result<Option<String>, ExtractError> {
        while !self.finished {
            let index = self.next_index;
            self.next_index += 1;

            let raw = match self.read(index).await {
                Ok(raw) => raw,
                Err(source) => {
                    self.finished = true;
                    return Err(ExtractError::Browser { index, source });
                }
            };
            let Some(raw) = raw else {
                trace!(index, "reference element absent; enumeration ends");
                self.finished = true;
                break;
            };

            let text = self.variant.normalize(&raw);
            if !text.is_empty() {
                return Ok(Some(text));
            }
            match self.variant.empty_rule() {
                EmptyRule::EmitBlank => return Ok(Some(text)),
                EmptyRule::Skip => {}
                EmptyRule::Terminate => self.finished = true,
            }
        }
        Ok(None)
    }

    /// The index the next read will query.
    #[must_use]
    pub fn position(&self) -> usize {
        self.next_index
    }

    async fn read(&mut self, index: usize) -> Result<Option<String>, BrowserError> {
        let value = self.session.evaluate(&self.variant.item_script(index)).await?;
        optional_string(value)
    }
}
