//! Entry points that accept uploads and requests, persist the owning record
//! and hand the work to a pipeline on the task executor.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncRead;
use tracing::{info, warn};
use uuid::Uuid;

use crate::comparison::ComparisonEngine;
use crate::config::{PipelineConfig, StorageLayout};
use crate::events::{EventSink, PipelineEvent};
use crate::executor::TaskExecutor;
use crate::export::ExportStreamer;
use crate::ingestion::ScanIngestion;
use crate::models::{
    BulkScanRecord, ComparisonData, ExportReportRecord, ExportReportType, ReportRecord, Status,
};
use crate::storage::FileStorage;
use crate::store::{RecordStore, RepositoryError};

/// Rows returned by [`Intake::report_data`].
pub const REPORT_DATA_LIMIT: usize = 10_000;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("storage error: {0}")]
    Storage(#[from] io::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("no bulk scan record named '{0}'")]
    BulkScanNotFound(String),

    #[error("bulk scan record {id} is {status}, not completed")]
    BulkScanNotCompleted { id: Uuid, status: Status },

    #[error("export report type '{0}' is not supported")]
    UnsupportedReportType(String),

    #[error("export report record {id} is {status}")]
    ExportNotReady { id: Uuid, status: Status },
}

impl IntakeError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IntakeError::BulkScanNotFound(_)
                | IntakeError::Repository(RepositoryError::NotFound(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, IntakeError>;

#[derive(Clone)]
pub struct Intake {
    store: Arc<dyn RecordStore>,
    storage: Arc<dyn FileStorage>,
    executor: Arc<dyn TaskExecutor>,
    events: Arc<dyn EventSink>,
    layout: StorageLayout,
    ingestion: ScanIngestion,
    comparison: ComparisonEngine,
    exporter: ExportStreamer,
}

impl Intake {
    pub fn new(
        store: Arc<dyn RecordStore>,
        storage: Arc<dyn FileStorage>,
        executor: Arc<dyn TaskExecutor>,
        events: Arc<dyn EventSink>,
        layout: StorageLayout,
        config: PipelineConfig,
    ) -> Self {
        let config = config.normalized();
        Self {
            ingestion: ScanIngestion::new(store.clone(), events.clone(), &config),
            comparison: ComparisonEngine::new(store.clone(), events.clone(), &config),
            exporter: ExportStreamer::new(store.clone(), events.clone(), &config),
            store,
            storage,
            executor,
            events,
            layout,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Saves an uploaded scan dump and starts ingesting it.
    pub async fn submit_bulk_scan(
        &self,
        file_name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<BulkScanRecord> {
        let path = self
            .storage
            .save(&self.layout.scans_dir, file_name, reader)
            .await?;
        let record = BulkScanRecord::new(path);
        self.store.insert_bulk_scan_record(&record).await?;
        info!(record = %record.record_ref(), file_name = %record.file_name, "bulk scan accepted");

        let ingestion = self.ingestion.clone();
        let task = record.clone();
        self.executor.spawn(
            "scan_ingestion",
            Box::pin(async move {
                ingestion.process(&task).await;
            }),
        );
        Ok(record)
    }

    /// Saves a reference CSV and starts comparing it against the most recent
    /// bulk scan named `bulk_scan_file_name`.
    pub async fn request_report(
        &self,
        bulk_scan_file_name: &str,
        reference_file_name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<ReportRecord> {
        let bulk_scan = self
            .store
            .find_bulk_scan_record(bulk_scan_file_name)
            .await?
            .ok_or_else(|| IntakeError::BulkScanNotFound(bulk_scan_file_name.to_string()))?;
        if bulk_scan.status != Status::Completed {
            return Err(IntakeError::BulkScanNotCompleted {
                id: bulk_scan.id,
                status: bulk_scan.status,
            });
        }

        let path = self
            .storage
            .save(&self.layout.references_dir, reference_file_name, reader)
            .await?;
        let report = ReportRecord::new(bulk_scan.id, path);
        self.store.insert_report_record(&report).await?;
        info!(
            record = %report.record_ref(),
            bulk_scan = %bulk_scan.record_ref(),
            "comparison report requested"
        );

        let comparison = self.comparison.clone();
        let task = report.clone();
        self.executor.spawn(
            "comparison",
            Box::pin(async move {
                comparison.generate(&task).await;
            }),
        );
        Ok(report)
    }

    /// Returns the live export of `report_record_id` for this type, or starts
    /// a new one when there is none or the last one failed.
    pub async fn request_export(
        &self,
        report_record_id: Uuid,
        report_type: &str,
    ) -> Result<ExportReportRecord> {
        let report_type = match ExportReportType::try_from(report_type) {
            Ok(ExportReportType::Json) => ExportReportType::Json,
            _ => return Err(IntakeError::UnsupportedReportType(report_type.to_string())),
        };
        let report = self.store.report_record(report_record_id).await?;

        if let Some(existing) = self.live_export(report.id, report_type).await? {
            return Ok(existing);
        }

        let file_name = ExportReportRecord::file_name_for(report.id, report_type);
        let export = ExportReportRecord::new(
            report.id,
            report_type,
            self.layout.exports_dir.join(&file_name),
        );
        match self.store.insert_export_record(&export).await {
            Ok(()) => {}
            Err(RepositoryError::Duplicate { .. }) => {
                // Lost the race against a concurrent request.
                if let Some(existing) = self.live_export(report.id, report_type).await? {
                    return Ok(existing);
                }
                self.store.insert_export_record(&export).await?;
            }
            Err(err) => return Err(err.into()),
        }

        if let Err(err) = self
            .storage
            .create_file(&self.layout.exports_dir, &file_name)
            .await
        {
            warn!(record = %export.record_ref(), error = %err, "could not create export file");
            self.abandon(&export).await;
            return Err(IntakeError::Storage(err));
        }
        info!(record = %export.record_ref(), report = %report.record_ref(), "export requested");

        let exporter = self.exporter.clone();
        let task = export.clone();
        self.executor.spawn(
            "export",
            Box::pin(async move {
                exporter.export(&task).await;
            }),
        );
        Ok(export)
    }

    async fn live_export(
        &self,
        report_record_id: Uuid,
        report_type: ExportReportType,
    ) -> Result<Option<ExportReportRecord>> {
        Ok(self
            .store
            .find_export_record(report_record_id, report_type)
            .await?
            .filter(|export| export.status != Status::Failed))
    }

    /// Marks an export that never started as failed so it no longer blocks
    /// new requests.
    async fn abandon(&self, export: &ExportReportRecord) {
        if let Err(err) = self
            .store
            .transition_status(export.record_ref(), Status::Pending, Status::Failed)
            .await
        {
            self.events.emit(PipelineEvent::StatusWriteFailed {
                record: export.record_ref(),
                status: Status::Failed,
                error: err.to_string(),
            });
        }
    }

    pub async fn bulk_scan_records(&self) -> Result<Vec<BulkScanRecord>> {
        Ok(self.store.list_bulk_scan_records().await?)
    }

    pub async fn bulk_scan_record(&self, id: Uuid) -> Result<BulkScanRecord> {
        Ok(self.store.bulk_scan_record(id).await?)
    }

    pub async fn report_records(&self) -> Result<Vec<ReportRecord>> {
        Ok(self.store.list_report_records().await?)
    }

    pub async fn report_record(&self, id: Uuid) -> Result<ReportRecord> {
        Ok(self.store.report_record(id).await?)
    }

    /// First [`REPORT_DATA_LIMIT`] comparison rows of a report.
    pub async fn report_data(&self, report_record_id: Uuid) -> Result<Vec<ComparisonData>> {
        let report = self.store.report_record(report_record_id).await?;
        Ok(self
            .store
            .comparison_page(report.id, REPORT_DATA_LIMIT, 0)
            .await?)
    }

    pub async fn export_records(&self, report_record_id: Uuid) -> Result<Vec<ExportReportRecord>> {
        let report = self.store.report_record(report_record_id).await?;
        Ok(self.store.list_export_records(report.id).await?)
    }

    pub async fn export_record(&self, id: Uuid) -> Result<ExportReportRecord> {
        Ok(self.store.export_record(id).await?)
    }

    /// The export if its file is complete and safe to hand out.
    pub async fn completed_export(&self, id: Uuid) -> Result<ExportReportRecord> {
        let export = self.store.export_record(id).await?;
        if export.status != Status::Completed {
            return Err(IntakeError::ExportNotReady {
                id: export.id,
                status: export.status,
            });
        }
        Ok(export)
    }
}
