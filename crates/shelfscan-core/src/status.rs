//! Status lifecycle shared by the pipelines.
//!
//! A run claims its record with a Pending -> Processing compare-and-set in
//! [`ActiveRun::begin`] and releases it with exactly one terminal transition
//! in [`ActiveRun::finish`]. A record that is not Pending belongs to another
//! run and is left alone.

use crate::error::PipelineError;
use crate::events::{EventSink, PipelineEvent, PipelineKind};
use crate::models::{RecordRef, Status};
use crate::store::{RecordStore, RepositoryError};

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed { rows: usize },
    Failed { rows: usize, error: String },
    /// The record was not Pending when the run started; nothing was done.
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub record: RecordRef,
    pub outcome: RunOutcome,
    /// Status the store holds for the record as far as this run knows.
    pub final_status: Option<Status>,
    /// False when any status write of this run failed.
    pub status_persisted: bool,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Failed { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.outcome, RunOutcome::Rejected { .. })
    }

    pub fn rows(&self) -> usize {
        match self.outcome {
            RunOutcome::Completed { rows } | RunOutcome::Failed { rows, .. } => rows,
            RunOutcome::Rejected { .. } => 0,
        }
    }
}

/// A claimed record. Dropping it without calling [`ActiveRun::finish`]
/// leaves the record in Processing.
pub struct ActiveRun<'a> {
    store: &'a dyn RecordStore,
    events: &'a dyn EventSink,
    pipeline: PipelineKind,
    record: RecordRef,
    persisted: Status,
    status_persisted: bool,
    rows: usize,
}

impl<'a> ActiveRun<'a> {
    /// Claims `record` for `pipeline`. Returns the rejection report when the
    /// record is missing or no longer Pending.
    pub async fn begin(
        store: &'a dyn RecordStore,
        events: &'a dyn EventSink,
        pipeline: PipelineKind,
        record: RecordRef,
    ) -> Result<ActiveRun<'a>, RunReport> {
        let mut run = ActiveRun {
            store,
            events,
            pipeline,
            record,
            persisted: Status::Pending,
            status_persisted: true,
            rows: 0,
        };

        match store
            .transition_status(record, Status::Pending, Status::Processing)
            .await
        {
            Ok(()) => run.persisted = Status::Processing,
            Err(err @ (RepositoryError::StatusConflict { .. } | RepositoryError::NotFound(_))) => {
                let reason = err.to_string();
                events.emit(PipelineEvent::Rejected {
                    pipeline,
                    record,
                    reason: reason.clone(),
                });
                let final_status = match err {
                    RepositoryError::StatusConflict { actual, .. } => Some(actual),
                    _ => None,
                };
                return Err(RunReport {
                    record,
                    outcome: RunOutcome::Rejected { reason },
                    final_status,
                    status_persisted: true,
                });
            }
            Err(err) => {
                run.status_persisted = false;
                events.emit(PipelineEvent::StatusWriteFailed {
                    record,
                    status: Status::Processing,
                    error: err.to_string(),
                });
            }
        }

        events.emit(PipelineEvent::Started { pipeline, record });
        Ok(run)
    }

    pub fn record(&self) -> RecordRef {
        self.record
    }

    pub fn events(&self) -> &'a dyn EventSink {
        self.events
    }

    pub fn add_rows(&mut self, rows: usize) {
        self.rows += rows;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Ends the run with a single terminal status write.
    pub async fn finish(self, result: Result<(), PipelineError>) -> RunReport {
        let (target, outcome) = match result {
            Ok(()) => {
                self.events.emit(PipelineEvent::Completed {
                    pipeline: self.pipeline,
                    record: self.record,
                    rows: self.rows,
                });
                (Status::Completed, RunOutcome::Completed { rows: self.rows })
            }
            Err(err) => {
                let error = err.to_string();
                self.events.emit(PipelineEvent::Failed {
                    pipeline: self.pipeline,
                    record: self.record,
                    category: err.category(),
                    error: error.clone(),
                });
                (
                    Status::Failed,
                    RunOutcome::Failed {
                        rows: self.rows,
                        error,
                    },
                )
            }
        };

        let mut status_persisted = self.status_persisted;
        let final_status = match self
            .store
            .transition_status(self.record, self.persisted, target)
            .await
        {
            Ok(()) => target,
            Err(err) => {
                status_persisted = false;
                self.events.emit(PipelineEvent::StatusWriteFailed {
                    record: self.record,
                    status: target,
                    error: err.to_string(),
                });
                self.persisted
            }
        };

        RunReport {
            record: self.record,
            outcome,
            final_status: Some(final_status),
            status_persisted,
        }
    }
}
