//! Structured events emitted by the pipelines.
//!
//! Pipelines report progress through an [`EventSink`] handed to them at
//! construction instead of logging directly, so the same code runs under
//! `tracing` in the server and under an in-memory recorder in tests.

use std::sync::{Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use crate::error::ErrorCategory;
use crate::models::{ComparisonOutcome, RecordRef, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    ScanIngestion,
    Comparison,
    Export,
}

impl PipelineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::ScanIngestion => "scan_ingestion",
            PipelineKind::Comparison => "comparison",
            PipelineKind::Export => "export",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Started {
        pipeline: PipelineKind,
        record: RecordRef,
    },
    /// The record was not pending, so another run owns it.
    Rejected {
        pipeline: PipelineKind,
        record: RecordRef,
        reason: String,
    },
    ScanBatchFlushed {
        record: RecordRef,
        rows: usize,
        total: usize,
    },
    RowCompared {
        record: RecordRef,
        location: String,
        outcome: ComparisonOutcome,
    },
    PageWritten {
        record: RecordRef,
        rows: usize,
        total: usize,
    },
    Completed {
        pipeline: PipelineKind,
        record: RecordRef,
        rows: usize,
    },
    Failed {
        pipeline: PipelineKind,
        record: RecordRef,
        category: ErrorCategory,
        error: String,
    },
    StatusWriteFailed {
        record: RecordRef,
        status: Status,
        error: String,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::Started { pipeline, record } => {
                info!(pipeline = pipeline.as_str(), %record, "pipeline started");
            }
            PipelineEvent::Rejected {
                pipeline,
                record,
                reason,
            } => {
                warn!(pipeline = pipeline.as_str(), %record, %reason, "pipeline run rejected");
            }
            PipelineEvent::ScanBatchFlushed {
                record,
                rows,
                total,
            } => {
                debug!(%record, rows, total, "scan batch persisted");
            }
            PipelineEvent::RowCompared {
                record,
                location,
                outcome,
            } => {
                debug!(%record, %location, outcome = outcome.as_str(), "reference row compared");
            }
            PipelineEvent::PageWritten {
                record,
                rows,
                total,
            } => {
                debug!(%record, rows, total, "export page written");
            }
            PipelineEvent::Completed {
                pipeline,
                record,
                rows,
            } => {
                info!(pipeline = pipeline.as_str(), %record, rows, "pipeline completed");
            }
            PipelineEvent::Failed {
                pipeline,
                record,
                category,
                error,
            } => {
                error!(
                    pipeline = pipeline.as_str(),
                    %record,
                    category = category.as_str(),
                    %error,
                    "pipeline failed"
                );
            }
            PipelineEvent::StatusWriteFailed {
                record,
                status,
                error,
            } => {
                error!(%record, %status, %error, "failed to persist record status");
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: PipelineEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
