//! Bibharvest Core Library
//!
//! This library provides the harvesting pipeline behind the `bibharvest`
//! tool, which walks a bibliography and retrieves, per entry, the article's
//! PDF, its reference list, or an exported citation record.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Per-target politeness defaults and oracle credentials
//! - [`outcome`] - Three-way harvest result
//! - [`entry`] - BibTeX bibliography reading and citation record parsing
//! - [`browser`] - Scoped browser automation sessions
//! - [`download`] - HTTP fetching with PDF validation and partial-file cleanup
//! - [`dispatch`] - Domain-to-strategy table for PDF retrieval
//! - [`extract`] - Per-site reference list extraction
//! - [`scholar`] - Citation search and export automaton
//! - [`classify`] - Classification oracle client
//! - [`output`] - Append-only output and failure log files
//! - [`pipeline`] - Sequential runner with politeness delay and circuit breaker

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod browser;
pub mod classify;
pub mod config;
pub mod dispatch;
pub mod download;
pub mod entry;
pub mod extract;
pub mod outcome;
pub mod output;
pub mod pipeline;
pub mod scholar;
mod user_agent;

// Re-export commonly used types
pub use browser::{BrowserError, BrowserSession, ChromiumLauncher, SessionLauncher};
pub use config::{ConfigError, OracleConfig, RunConfig};
pub use dispatch::{DispatchError, DomainDispatcher, DownloadStrategy, domain};
pub use entry::{BibliographyEntry, EntryField, EntrySource, MissingFieldError};
pub use extract::{ReferenceExtractor, SiteVariant};
pub use outcome::HarvestOutcome;
pub use output::{FailureLog, FailureRecord, OutputSink};
pub use pipeline::{PipelineError, PipelineRunner, RunState, RunStats};
pub use scholar::{CitationSearchAutomaton, SearchSettings};
