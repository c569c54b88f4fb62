use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use shelfscan_parser::ParserError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ExportReportType;
use crate::store::RepositoryError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("file I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] ParserError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("no scan for location '{location}' in bulk scan record {bulk_scan_record_id}")]
    ScanNotFound {
        bulk_scan_record_id: Uuid,
        location: String,
    },

    #[error("export report type '{0}' is not supported")]
    UnsupportedReportType(ExportReportType),

    #[error("reference reader stopped unexpectedly: {0}")]
    Reader(String),
}

/// Coarse classification of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Io,
    Format,
    Consistency,
    Persistence,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Io => "io",
            ErrorCategory::Format => "format",
            ErrorCategory::Consistency => "consistency",
            ErrorCategory::Persistence => "persistence",
        }
    }
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::Io { .. } | PipelineError::Reader(_) => ErrorCategory::Io,
            PipelineError::Parse(err) if err.is_io() => ErrorCategory::Io,
            PipelineError::Parse(_) | PipelineError::Json(_) => ErrorCategory::Format,
            PipelineError::ScanNotFound { .. } | PipelineError::UnsupportedReportType(_) => {
                ErrorCategory::Consistency
            }
            PipelineError::Repository(_) => ErrorCategory::Persistence,
        }
    }
}

/// Adapter for `map_err` on file operations against `path`.
pub(crate) fn io_error(path: &Path) -> impl Fn(io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
