//! Record store used by the pipelines and the intake service.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use sqlx::migrate::MigrateError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    BulkScanRecord, ComparisonData, ExportReportRecord, ExportReportType, RecordRef, ReportRecord,
    Scan, Status,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] MigrateError),

    #[error("invalid {field} value '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("record not found: {0}")]
    NotFound(RecordRef),

    #[error("{record} is {actual}, expected {expected}")]
    StatusConflict {
        record: RecordRef,
        expected: Status,
        actual: Status,
    },

    #[error("duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_bulk_scan_record(&self, record: &BulkScanRecord) -> Result<(), RepositoryError>;
    async fn bulk_scan_record(&self, id: Uuid) -> Result<BulkScanRecord, RepositoryError>;
    /// Most recently created record with this file name.
    async fn find_bulk_scan_record(
        &self,
        file_name: &str,
    ) -> Result<Option<BulkScanRecord>, RepositoryError>;
    async fn list_bulk_scan_records(&self) -> Result<Vec<BulkScanRecord>, RepositoryError>;

    /// Inserts every scan or none of them. Fails with `Duplicate` when a
    /// location already exists for the bulk scan record.
    async fn insert_scans(&self, scans: &[Scan]) -> Result<(), RepositoryError>;
    async fn find_scan(
        &self,
        bulk_scan_record_id: Uuid,
        location: &str,
    ) -> Result<Option<Scan>, RepositoryError>;

    async fn insert_report_record(&self, record: &ReportRecord) -> Result<(), RepositoryError>;
    async fn report_record(&self, id: Uuid) -> Result<ReportRecord, RepositoryError>;
    async fn list_report_records(&self) -> Result<Vec<ReportRecord>, RepositoryError>;

    async fn insert_comparison_row(&self, row: &ComparisonData) -> Result<(), RepositoryError>;
    /// Rows of a report in insertion order.
    async fn comparison_page(
        &self,
        report_record_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ComparisonData>, RepositoryError>;

    /// Fails with `Duplicate` while a non-failed export exists for the same
    /// report and type.
    async fn insert_export_record(&self, record: &ExportReportRecord)
        -> Result<(), RepositoryError>;
    async fn export_record(&self, id: Uuid) -> Result<ExportReportRecord, RepositoryError>;
    /// Most recently created export of `report_record_id` with this type.
    async fn find_export_record(
        &self,
        report_record_id: Uuid,
        report_type: ExportReportType,
    ) -> Result<Option<ExportReportRecord>, RepositoryError>;
    async fn list_export_records(
        &self,
        report_record_id: Uuid,
    ) -> Result<Vec<ExportReportRecord>, RepositoryError>;

    /// Moves `record` from `from` to `to`, failing with `StatusConflict` when
    /// the stored status is not `from`.
    async fn transition_status(
        &self,
        record: RecordRef,
        from: Status,
        to: Status,
    ) -> Result<(), RepositoryError>;
}
