//! Append-only, flush-per-record persistence for a run.
//!
//! [`OutputSink`] owns every file a run writes below its output directory:
//! aggregate append files (one result per line), per-entry commit files
//! written by rename, and the [`FailureLog`]. Each write is flushed before
//! the call returns, so an interrupted run loses at most the entry in flight.

mod failure;

pub use failure::{FailureKind, FailureLog, FailureRecord};

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// File name of the failure log inside the output directory.
pub const FAILURE_LOG_NAME: &str = "failures.log";

/// Errors persisting results.
#[derive(Debug, Error)]
pub enum OutputError {
    /// A file or directory operation failed.
    #[error("output IO error on {path}: {source}")]
    Io {
        /// Affected path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl OutputError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Owner of a run's output files.
#[derive(Debug)]
pub struct OutputSink {
    dir: PathBuf,
    appenders: HashMap<String, File>,
    failures: FailureLog,
}

impl OutputSink {
    /// Creates the output directory if needed and opens the failure log.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] if the directory or log cannot be created.
    pub async fn open(dir: &Path) -> Result<Self, OutputError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| OutputError::io(dir, e))?;
        let failures = FailureLog::open(&dir.join(FAILURE_LOG_NAME)).await?;
        Ok(Self {
            dir: dir.to_path_buf(),
            appenders: HashMap::new(),
            failures,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute path of `relative` inside the output directory.
    #[must_use]
    pub fn path_of(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.dir.join(relative)
    }

    /// Whether the committed output `relative` exists.
    #[must_use]
    pub fn exists(&self, relative: impl AsRef<Path>) -> bool {
        self.path_of(relative).exists()
    }

    /// Appends `lines` (one per line) to `name` and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] if the file cannot be opened or written.
    pub async fn append_lines(&mut self, name: &str, lines: &[String]) -> Result<(), OutputError> {
        let mut block = String::new();
        for line in lines {
            block.push_str(line);
            block.push('\n');
        }
        self.append_raw(name, &block).await
    }

    /// Appends `text` verbatim to `name` and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] if the file cannot be opened or written.
    pub async fn append_raw(&mut self, name: &str, text: &str) -> Result<(), OutputError> {
        let path = self.dir.join(name);
        if !self.appenders.contains_key(name) {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| OutputError::io(&path, e))?;
            self.appenders.insert(name.to_string(), file);
        }
        let Some(file) = self.appenders.get_mut(name) else {
            return Ok(());
        };
        file.write_all(text.as_bytes())
            .await
            .map_err(|e| OutputError::io(&path, e))?;
        file.flush().await.map_err(|e| OutputError::io(&path, e))
    }

    /// Writes `contents` to `relative` through a temporary file and a rename,
    /// so the file either exists complete or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] if writing or renaming fails.
    pub async fn commit_file(
        &self,
        relative: impl AsRef<Path>,
        contents: &[u8],
    ) -> Result<(), OutputError> {
        let target = self.path_of(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| OutputError::io(parent, e))?;
        }
        let staging = staging_path(&target);
        let mut file = File::create(&staging)
            .await
            .map_err(|e| OutputError::io(&staging, e))?;
        let written = async {
            file.write_all(contents).await?;
            file.sync_all().await
        }
        .await;
        drop(file);
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(OutputError::io(&staging, e));
        }
        self.promote(&staging, &target).await
    }

    /// Moves a fully written staging file onto its final name.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] if the rename fails.
    pub async fn promote(&self, staging: &Path, target: &Path) -> Result<(), OutputError> {
        tokio::fs::rename(staging, target)
            .await
            .map_err(|e| OutputError::io(target, e))?;
        debug!(path = %target.display(), "output committed");
        Ok(())
    }

    /// Non-blank lines of `name`, or an empty set if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] for read failures other than a missing file.
    pub async fn read_lines(&self, name: &str) -> Result<HashSet<String>, OutputError> {
        let path = self.dir.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
            Err(e) => Err(OutputError::io(path, e)),
        }
    }

    /// Appends one record to the failure log.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Io`] if the write fails.
    pub async fn log_failure(&mut self, record: &FailureRecord) -> Result<(), OutputError> {
        self.failures.append(record).await
    }

    #[must_use]
    pub fn failure_log_path(&self) -> &Path {
        self.failures.path()
    }
}

/// Sibling path used while a file is being written: `<name>.part`.
#[must_use]
pub fn staging_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}
