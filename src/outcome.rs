//! The tri-state result of one harvesting attempt.

use std::fmt;

/// Result of harvesting one entry.
///
/// `NotFound` is a legitimate terminal answer (a search with zero hits, an
/// article page without references) and is kept apart from `Error`, which
/// means the attempt itself failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestOutcome<T> {
    /// The payload was retrieved.
    Success(T),
    /// The source answered, but has nothing for this entry.
    NotFound,
    /// The attempt failed; the reason is human-readable.
    Error(String),
}

impl<T> HarvestOutcome<T> {
    /// Wraps any displayable error as an `Error` outcome.
    pub fn error(reason: impl fmt::Display) -> Self {
        Self::Error(reason.to_string())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Short label used in logs: `success`, `not_found` or `error`.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::NotFound => "not_found",
            Self::Error(_) => "error",
        }
    }
}

impl<T, E: fmt::Display> From<Result<T, E>> for HarvestOutcome<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::error(error),
        }
    }
}
