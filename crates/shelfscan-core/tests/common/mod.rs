#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use shelfscan_core::{
    BulkScanRecord, DeferredExecutor, Intake, LocalFileStorage, MemoryEventSink, MemoryStore,
    PipelineConfig, PipelineEvent, RecordStore, ReportRecord, Scan, Status, StorageLayout,
};
use tempfile::TempDir;
use uuid::Uuid;

/// In-memory store, recorded events and a scratch directory.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub events: Arc<MemoryEventSink>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            events: Arc::new(MemoryEventSink::new()),
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn config(&self, scan_batch_size: usize, export_page_size: usize) -> PipelineConfig {
        PipelineConfig {
            scan_batch_size,
            export_page_size,
            ..PipelineConfig::default()
        }
    }

    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("write fixture file");
        path
    }

    pub async fn pending_bulk_scan(&self, contents: &str) -> BulkScanRecord {
        let record = BulkScanRecord::new(self.write_file("scan.json", contents));
        self.store
            .insert_bulk_scan_record(&record)
            .await
            .expect("insert bulk scan record");
        record
    }

    /// A completed bulk scan whose scans are inserted directly.
    pub async fn completed_bulk_scan(&self, scans: &[(&str, bool, &[&str])]) -> BulkScanRecord {
        let mut record = BulkScanRecord::new(self.dir.path().join("seeded.json"));
        record.status = Status::Completed;
        self.store
            .insert_bulk_scan_record(&record)
            .await
            .expect("insert bulk scan record");
        let rows: Vec<Scan> = scans
            .iter()
            .map(|(location, occupied, barcodes)| Scan {
                bulk_scan_record_id: record.id,
                location: location.to_string(),
                scanned: true,
                occupied: *occupied,
                barcodes: barcodes.iter().map(|b| b.to_string()).collect(),
            })
            .collect();
        self.store.insert_scans(&rows).await.expect("seed scans");
        record
    }

    pub async fn pending_report(&self, bulk_scan_record_id: Uuid, csv: &str) -> ReportRecord {
        let record = ReportRecord::new(bulk_scan_record_id, self.write_file("reference.csv", csv));
        self.store
            .insert_report_record(&record)
            .await
            .expect("insert report record");
        record
    }

    pub fn intake(&self, executor: Arc<DeferredExecutor>, config: PipelineConfig) -> Intake {
        Intake::new(
            self.store.clone(),
            Arc::new(LocalFileStorage),
            executor,
            self.events.clone(),
            StorageLayout::under(self.dir.path()),
            config,
        )
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.events()
    }
}

pub fn scan_json(location: &str, occupied: bool, barcodes: &[&str]) -> Value {
    json!({
        "name": location,
        "scanned": true,
        "occupied": occupied,
        "detected_barcodes": barcodes,
    })
}

pub fn scan_array(count: usize) -> String {
    let scans: Vec<Value> = (0..count)
        .map(|index| scan_json(&format!("L{index}"), index % 2 == 0, &["B"]))
        .collect();
    serde_json::to_string_pretty(&scans).expect("serialize scans")
}
