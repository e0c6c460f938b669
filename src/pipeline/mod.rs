//! Sequential harvesting runs.
//!
//! A [`PipelineRunner`] walks the items of a run one at a time and, for each:
//!
//! 1. validates the field the job needs (skip with a warning if missing),
//! 2. skips the item if its committed output already exists,
//! 3. harvests it and classifies the result as a [`HarvestOutcome`],
//! 4. commits successes and logs `Error`/`NotFound` to the failure log,
//! 5. sleeps the politeness delay.
//!
//! Consecutive failures feed a [`CircuitBreaker`]; once it opens, the run
//! stops with [`PipelineError::CircuitBreakerTripped`] before touching the
//! next item. Because completed items are skipped by output existence, a
//! rerun resumes at the first item without output.

mod circuit;
pub mod jobs;

pub use circuit::{CircuitBreaker, CircuitState};

use async_trait::async_trait;
use indicatif::ProgressBar;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::entry::MissingFieldError;
use crate::outcome::HarvestOutcome;
use crate::output::{FailureKind, FailureRecord, OutputError, OutputSink};

/// Run-level failures. Per-item failures never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Too many items in a row failed.
    #[error(
        "too many consecutive failures ({failures}); stopping before `{next_item}`. \
         Rerun the same command to resume."
    )]
    CircuitBreakerTripped {
        /// Length of the failure streak.
        failures: u32,
        /// The first item that was not attempted.
        next_item: String,
    },

    /// Results could not be persisted.
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub not_found: usize,
    pub failed: usize,
    pub skipped_existing: usize,
    pub skipped_invalid: usize,
}

/// Mutable state threaded through a run: open sinks, the failure streak and
/// the counters.
#[derive(Debug)]
pub struct RunState {
    sink: OutputSink,
    breaker: CircuitBreaker,
    stats: RunStats,
}

impl RunState {
    #[must_use]
    pub fn new(sink: OutputSink, config: &RunConfig) -> Self {
        Self {
            sink,
            breaker: CircuitBreaker::new(config.failure_tolerance),
            stats: RunStats::default(),
        }
    }

    #[must_use]
    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    #[must_use]
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.breaker.consecutive_failures()
    }
}

/// One kind of harvesting work, plugged into a [`PipelineRunner`].
#[async_trait]
pub trait HarvestJob: Send + Sync {
    type Item: Send + Sync;
    type Payload: Send;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Identifier written to logs and the failure log.
    fn item_id(&self, item: &Self::Item) -> String;

    /// The URL or query the item will be harvested from.
    ///
    /// # Errors
    ///
    /// Returns [`MissingFieldError`] when the item lacks the field this job
    /// needs; the item is then skipped without any network activity.
    fn target(&self, item: &Self::Item) -> Result<String, MissingFieldError>;

    /// Whether the item's output was committed by an earlier run.
    fn is_committed(&self, item: &Self::Item, sink: &OutputSink) -> bool;

    /// Fetches the item. Must not write committed output.
    async fn harvest(
        &self,
        item: &Self::Item,
        target: &str,
        sink: &OutputSink,
    ) -> HarvestOutcome<Self::Payload>;

    /// Persists a successful harvest.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError`] if the result cannot be written; the run stops.
    async fn commit(
        &self,
        item: &Self::Item,
        payload: Self::Payload,
        sink: &mut OutputSink,
    ) -> Result<(), OutputError>;

    /// Extra bookkeeping after an `Error` or `NotFound`, beyond the failure log.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError`] if the bookkeeping cannot be written.
    async fn record_failure(
        &self,
        _item: &Self::Item,
        _sink: &mut OutputSink,
    ) -> Result<(), OutputError> {
        Ok(())
    }

    /// Whether `NotFound` counts toward the circuit breaker.
    fn not_found_is_failure(&self) -> bool {
        false
    }

    /// Reason column of the failure-log line written for a `NotFound`.
    fn not_found_reason(&self, _id: &str) -> String {
        "no result".to_string()
    }
}

/// Runs a [`HarvestJob`] over a list of items, strictly one at a time.
pub struct PipelineRunner<J> {
    job: J,
    config: RunConfig,
    progress: Option<ProgressBar>,
}

impl<J: HarvestJob> PipelineRunner<J> {
    #[must_use]
    pub fn new(job: J, config: RunConfig) -> Self {
        Self {
            job,
            config,
            progress: None,
        }
    }

    /// Reports per-item progress on `bar`.
    #[must_use]
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    #[must_use]
    pub fn job(&self) -> &J {
        &self.job
    }

    /// Processes `items` in order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::CircuitBreakerTripped`] when the failure
    /// streak reaches the tolerance and items remain, or
    /// [`PipelineError::Output`] when results cannot be persisted.
    pub async fn run(
        &self,
        items: &[J::Item],
        state: &mut RunState,
    ) -> Result<RunStats, PipelineError> {
        let job = self.job.name();
        if let Some(bar) = &self.progress {
            bar.set_length(items.len() as u64);
        }

        for (index, item) in items.iter().enumerate() {
            let id = self.job.item_id(item);
            if state.breaker.is_open() {
                warn!(
                    job,
                    failures = state.breaker.consecutive_failures(),
                    next = %id,
                    "circuit breaker open; aborting run"
                );
                self.finish_progress();
                return Err(PipelineError::CircuitBreakerTripped {
                    failures: state.breaker.consecutive_failures(),
                    next_item: id,
                });
            }
            if let Some(bar) = &self.progress {
                bar.set_position(index as u64);
                bar.set_message(format!("{job} {id}"));
            }

            let target = match self.job.target(item) {
                Ok(target) => target,
                Err(error) => {
                    warn!(job, entry = %id, error = %error, "skipping entry");
                    state.stats.skipped_invalid += 1;
                    continue;
                }
            };
            if self.job.is_committed(item, &state.sink) {
                debug!(job, entry = %id, "output exists; skipping");
                state.stats.skipped_existing += 1;
                continue;
            }

            state.stats.attempted += 1;
            let outcome = self.job.harvest(item, &target, &state.sink).await;
            self.settle(item, &id, &target, outcome, state).await?;

            let is_last = index + 1 == items.len();
            if !is_last && !state.breaker.is_open() && !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }
        }

        self.finish_progress();
        info!(
            job,
            attempted = state.stats.attempted,
            succeeded = state.stats.succeeded,
            not_found = state.stats.not_found,
            failed = state.stats.failed,
            skipped = state.stats.skipped_existing + state.stats.skipped_invalid,
            "run complete"
        );
        Ok(state.stats.clone())
    }

    async fn settle(
        &self,
        item: &J::Item,
        id: &str,
        target: &str,
        outcome: HarvestOutcome<J::Payload>,
        state: &mut RunState,
    ) -> Result<(), PipelineError> {
        let job = self.job.name();
        match outcome {
            HarvestOutcome::Success(payload) => {
                self.job.commit(item, payload, &mut state.sink).await?;
                state.breaker.record_success();
                state.stats.succeeded += 1;
                info!(job, entry = %id, "harvested");
            }
            HarvestOutcome::NotFound => {
                info!(job, entry = %id, target, "no result");
                state
                    .sink
                    .log_failure(&FailureRecord::now(
                        FailureKind::NotFound,
                        id,
                        target,
                        self.job.not_found_reason(id),
                    ))
                    .await?;
                self.job.record_failure(item, &mut state.sink).await?;
                state.stats.not_found += 1;
                if self.job.not_found_is_failure() {
                    state.breaker.record_failure();
                }
            }
            HarvestOutcome::Error(reason) => {
                warn!(job, entry = %id, target, reason = %reason, "harvest failed");
                state
                    .sink
                    .log_failure(&FailureRecord::now(FailureKind::Error, id, target, reason))
                    .await?;
                self.job.record_failure(item, &mut state.sink).await?;
                state.stats.failed += 1;
                state.breaker.record_failure();
            }
        }
        Ok(())
    }

    fn finish_progress(&self) {
        if let Some(bar) = &self.progress {
            bar.finish_and_clear();
        }
    }
}
