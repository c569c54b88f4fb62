use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecordStore, RepositoryError};
use crate::models::{
    BulkScanRecord, ComparisonData, ExportReportRecord, ExportReportType, RecordKind, RecordRef,
    ReportRecord, Scan, Status,
};

/// In-process store. Keeps insertion order, enforces the same uniqueness
/// rules as the Postgres schema, counts write calls and can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    bulk_scans: Vec<BulkScanRecord>,
    scans: HashMap<Uuid, ScanTable>,
    reports: Vec<ReportRecord>,
    comparison: HashMap<Uuid, Vec<ComparisonData>>,
    exports: Vec<ExportReportRecord>,
    scan_insert_calls: usize,
    comparison_insert_calls: usize,
    faults: Faults,
}

#[derive(Debug, Default)]
struct ScanTable {
    rows: Vec<Scan>,
    by_location: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct Faults {
    scan_inserts_before_failure: Option<usize>,
    comparison_inserts_before_failure: Option<usize>,
    fail_comparison_reads: bool,
    fail_status_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `calls` scan inserts succeed, then fails every later one.
    pub async fn fail_scan_inserts_after(&self, calls: usize) {
        self.state.write().await.faults.scan_inserts_before_failure = Some(calls);
    }

    /// Lets `calls` comparison inserts succeed, then fails every later one.
    pub async fn fail_comparison_inserts_after(&self, calls: usize) {
        self.state.write().await.faults.comparison_inserts_before_failure = Some(calls);
    }

    pub async fn fail_comparison_reads(&self, fail: bool) {
        self.state.write().await.faults.fail_comparison_reads = fail;
    }

    pub async fn fail_status_writes(&self, fail: bool) {
        self.state.write().await.faults.fail_status_writes = fail;
    }

    pub async fn scan_insert_calls(&self) -> usize {
        self.state.read().await.scan_insert_calls
    }

    pub async fn comparison_insert_calls(&self) -> usize {
        self.state.read().await.comparison_insert_calls
    }

    pub async fn scans_for(&self, bulk_scan_record_id: Uuid) -> Vec<Scan> {
        self.state
            .read()
            .await
            .scans
            .get(&bulk_scan_record_id)
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }

    pub async fn comparison_rows_for(&self, report_record_id: Uuid) -> Vec<ComparisonData> {
        self.state
            .read()
            .await
            .comparison
            .get(&report_record_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl MemoryState {
    fn status_of(&mut self, record: RecordRef) -> Option<(&mut Status, &mut chrono::DateTime<Utc>)> {
        match record.kind {
            RecordKind::BulkScan => self
                .bulk_scans
                .iter_mut()
                .find(|r| r.id == record.id)
                .map(|r| (&mut r.status, &mut r.updated_at)),
            RecordKind::Report => self
                .reports
                .iter_mut()
                .find(|r| r.id == record.id)
                .map(|r| (&mut r.status, &mut r.updated_at)),
            RecordKind::Export => self
                .exports
                .iter_mut()
                .find(|r| r.id == record.id)
                .map(|r| (&mut r.status, &mut r.updated_at)),
        }
    }
}

fn scan_key(bulk_scan_record_id: Uuid, location: &str) -> String {
    format!("{bulk_scan_record_id}/{location}")
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_bulk_scan_record(&self, record: &BulkScanRecord) -> Result<(), RepositoryError> {
        self.state.write().await.bulk_scans.push(record.clone());
        Ok(())
    }

    async fn bulk_scan_record(&self, id: Uuid) -> Result<BulkScanRecord, RepositoryError> {
        self.state
            .read()
            .await
            .bulk_scans
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound(RecordRef::bulk_scan(id)))
    }

    async fn find_bulk_scan_record(
        &self,
        file_name: &str,
    ) -> Result<Option<BulkScanRecord>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .bulk_scans
            .iter()
            .rev()
            .find(|r| r.file_name == file_name)
            .cloned())
    }

    async fn list_bulk_scan_records(&self) -> Result<Vec<BulkScanRecord>, RepositoryError> {
        Ok(self.state.read().await.bulk_scans.clone())
    }

    async fn insert_scans(&self, scans: &[Scan]) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.scan_insert_calls += 1;
        if let Some(limit) = state.faults.scan_inserts_before_failure {
            if state.scan_insert_calls > limit {
                return Err(RepositoryError::Unavailable("scan insert rejected".into()));
            }
        }

        let mut incoming = HashSet::new();
        for scan in scans {
            let exists = state
                .scans
                .get(&scan.bulk_scan_record_id)
                .is_some_and(|table| table.by_location.contains_key(&scan.location));
            if exists || !incoming.insert((scan.bulk_scan_record_id, scan.location.as_str())) {
                return Err(RepositoryError::Duplicate {
                    entity: "scan",
                    key: scan_key(scan.bulk_scan_record_id, &scan.location),
                });
            }
        }

        for scan in scans {
            let table = state.scans.entry(scan.bulk_scan_record_id).or_default();
            table
                .by_location
                .insert(scan.location.clone(), table.rows.len());
            table.rows.push(scan.clone());
        }
        Ok(())
    }

    async fn find_scan(
        &self,
        bulk_scan_record_id: Uuid,
        location: &str,
    ) -> Result<Option<Scan>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.scans.get(&bulk_scan_record_id).and_then(|table| {
            table
                .by_location
                .get(location)
                .map(|index| table.rows[*index].clone())
        }))
    }

    async fn insert_report_record(&self, record: &ReportRecord) -> Result<(), RepositoryError> {
        self.state.write().await.reports.push(record.clone());
        Ok(())
    }

    async fn report_record(&self, id: Uuid) -> Result<ReportRecord, RepositoryError> {
        self.state
            .read()
            .await
            .reports
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound(RecordRef::report(id)))
    }

    async fn list_report_records(&self) -> Result<Vec<ReportRecord>, RepositoryError> {
        Ok(self.state.read().await.reports.clone())
    }

    async fn insert_comparison_row(&self, row: &ComparisonData) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.comparison_insert_calls += 1;
        if let Some(limit) = state.faults.comparison_inserts_before_failure {
            if state.comparison_insert_calls > limit {
                return Err(RepositoryError::Unavailable(
                    "comparison insert rejected".into(),
                ));
            }
        }
        state
            .comparison
            .entry(row.report_record_id)
            .or_default()
            .push(row.clone());
        Ok(())
    }

    async fn comparison_page(
        &self,
        report_record_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ComparisonData>, RepositoryError> {
        let state = self.state.read().await;
        if state.faults.fail_comparison_reads {
            return Err(RepositoryError::Unavailable("comparison read rejected".into()));
        }
        Ok(state
            .comparison
            .get(&report_record_id)
            .map(|rows| rows.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_export_record(
        &self,
        record: &ExportReportRecord,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let active = state.exports.iter().any(|existing| {
            existing.report_record_id == record.report_record_id
                && existing.report_type == record.report_type
                && existing.status != Status::Failed
        });
        if active {
            return Err(RepositoryError::Duplicate {
                entity: "export report record",
                key: format!("{}/{}", record.report_record_id, record.report_type),
            });
        }
        state.exports.push(record.clone());
        Ok(())
    }

    async fn export_record(&self, id: Uuid) -> Result<ExportReportRecord, RepositoryError> {
        self.state
            .read()
            .await
            .exports
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound(RecordRef::export(id)))
    }

    async fn find_export_record(
        &self,
        report_record_id: Uuid,
        report_type: ExportReportType,
    ) -> Result<Option<ExportReportRecord>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .exports
            .iter()
            .rev()
            .find(|r| r.report_record_id == report_record_id && r.report_type == report_type)
            .cloned())
    }

    async fn list_export_records(
        &self,
        report_record_id: Uuid,
    ) -> Result<Vec<ExportReportRecord>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .exports
            .iter()
            .filter(|r| r.report_record_id == report_record_id)
            .cloned()
            .collect())
    }

    async fn transition_status(
        &self,
        record: RecordRef,
        from: Status,
        to: Status,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.faults.fail_status_writes {
            return Err(RepositoryError::Unavailable("status write rejected".into()));
        }

        let (status, updated_at) = state
            .status_of(record)
            .ok_or(RepositoryError::NotFound(record))?;
        if *status != from {
            return Err(RepositoryError::StatusConflict {
                record,
                expected: from,
                actual: *status,
            });
        }
        *status = to;
        *updated_at = Utc::now();
        Ok(())
    }
}
