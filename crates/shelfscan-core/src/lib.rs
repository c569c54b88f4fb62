pub mod comparison;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod export;
pub mod ingestion;
pub mod intake;
pub mod models;
pub mod status;
pub mod storage;
pub mod store;

pub use comparison::{classify, ComparisonEngine};
pub use config::{PipelineConfig, StorageLayout};
pub use error::{ErrorCategory, PipelineError};
pub use events::{EventSink, MemoryEventSink, PipelineEvent, PipelineKind, TracingEventSink};
pub use executor::{DeferredExecutor, TaskExecutor, TokioExecutor};
pub use export::ExportStreamer;
pub use ingestion::ScanIngestion;
pub use intake::{Intake, IntakeError, REPORT_DATA_LIMIT};
pub use models::{
    BulkScanRecord, ComparisonData, ComparisonOutcome, ExportReportRecord, ExportReportType,
    RecordKind, RecordRef, ReportRecord, Scan, Status,
};
pub use status::{ActiveRun, RunOutcome, RunReport};
pub use storage::{FileStorage, LocalFileStorage};
pub use store::{MemoryStore, PostgresStore, RecordStore, RepositoryError};
