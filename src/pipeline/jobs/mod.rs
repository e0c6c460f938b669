//! The four harvesting jobs.

mod cite;
mod classify;
mod download;
mod references;

pub use cite::{CitationQuery, CiteJob, load_citation_queries};
pub use classify::{
    CLASSIFIED_LEDGER, ClassifyJob, FAILED_LINES, RESULT_FILE, ReferenceLine, load_reference_lines,
};
pub use download::DownloadJob;
pub use references::{DEFAULT_CITED_BY_SETTLE, ReferenceHarvest, ReferencesJob};

use std::fmt::Write as _;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use thiserror::Error;

const MAX_STEM_CHARS: usize = 80;
const DIGEST_SUFFIX_BYTES: usize = 4;

/// A line-oriented input file could not be read.
#[derive(Debug, Error)]
#[error("cannot read {path}: {source}")]
pub struct InputError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// File-system safe stem for an entry identifier; case is kept.
///
/// Identifiers that are already safe are used as-is. Any other identifier
/// gets a digest suffix, so `a:b` and `a_b` never share a file.
#[must_use]
pub fn entry_file_stem(id: &str) -> String {
    let id = id.trim();
    let stem: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_CHARS)
        .collect();
    let stem = stem.trim_start_matches('.');
    if !stem.is_empty() && stem == id {
        return stem.to_string();
    }
    let stem = if stem.is_empty() { "entry" } else { stem };
    format!("{stem}-{}", digest_suffix(id))
}

/// Lowercase, dash-separated stem for a free-text title, suffixed with a
/// digest of the full title.
#[must_use]
pub fn title_file_stem(title: &str) -> String {
    let mut stem = String::new();
    for word in title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
    {
        if stem.chars().count() + word.chars().count() + 1 > MAX_STEM_CHARS {
            break;
        }
        if !stem.is_empty() {
            stem.push('-');
        }
        stem.push_str(&word);
    }
    if stem.is_empty() {
        stem.push_str("untitled");
    }
    format!("{stem}-{}", digest_suffix(title))
}

fn digest_suffix(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest
        .iter()
        .take(DIGEST_SUFFIX_BYTES)
        .fold(String::with_capacity(DIGEST_SUFFIX_BYTES * 2), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}
