//! The append-only failure log.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::OutputError;

/// Why an entry produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The attempt failed.
    Error,
    /// The source had nothing for the entry.
    NotFound,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "Error",
            Self::NotFound => "No result",
        })
    }
}

/// One incident in the failure log. Never rewritten once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub entry_id: String,
    pub url: String,
    pub kind: FailureKind,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    /// A record stamped with the current time.
    pub fn now(
        kind: FailureKind,
        entry_id: impl Into<String>,
        url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            url: url.into(),
            kind,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    /// `<RFC3339>\t<kind>\t<entry id>\t<url>\t<reason>`, tabs and newlines
    /// inside fields replaced by spaces.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.kind,
            one_line(&self.entry_id),
            one_line(&self.url),
            one_line(&self.reason),
        )
    }
}

fn one_line(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

/// Append-only failure log file; every line is flushed as it is written.
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    file: File,
}

impl FailureLog {
    /// Opens (or creates) the log for appending.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] if the file cannot be opened.
    pub async fn open(path: &Path) -> Result<Self, OutputError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| OutputError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Appends one record and flushes it.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] if the write fails.
    pub async fn append(&mut self, record: &FailureRecord) -> Result<(), OutputError> {
        let mut line = record.to_line();
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(|e| OutputError::io(&self.path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| OutputError::io(&self.path, e))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_failure_line_format() {
        let record = FailureRecord {
            entry_id: "key1".to_string(),
            url: "https://dl.acm.org/doi/10.1/x".to_string(),
            kind: FailureKind::Error,
            reason: "HTTP 403\tdownloading".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        };
        assert_eq!(
            record.to_line(),
            "2024-03-01T12:00:00Z\tError\tkey1\thttps://dl.acm.org/doi/10.1/x\tHTTP 403 downloading"
        );
        let not_found = FailureRecord {
            kind: FailureKind::NotFound,
            ..record
        };
        assert!(not_found.to_line().contains("\tNo result\t"));
    }

    #[tokio::test]
    async fn test_failure_log_appends_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failures.log");
        let record = FailureRecord::now(FailureKind::NotFound, "a", "q", "no result");
        FailureLog::open(&path).await.unwrap().append(&record).await.unwrap();
        FailureLog::open(&path).await.unwrap().append(&record).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
