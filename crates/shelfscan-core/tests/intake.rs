mod common;

use std::sync::Arc;

use common::{scan_array, Harness};
use serde_json::Value;
use shelfscan_core::{
    DeferredExecutor, ExportReportType, IntakeError, RecordStore, RepositoryError, Status,
};
use uuid::Uuid;

#[tokio::test]
async fn upload_compare_and_export_end_to_end() {
    let harness = Harness::new();
    let executor = Arc::new(DeferredExecutor::new());
    let intake = harness.intake(executor.clone(), harness.config(2, 2));

    let mut scans: &[u8] = br#"[
        {"name":"L1","scanned":true,"occupied":true,"detected_barcodes":["B1"]},
        {"name":"L2","scanned":true,"occupied":false,"detected_barcodes":[]},
        {"name":"L3","scanned":true,"occupied":true,"detected_barcodes":["X"]}
    ]"#;
    let bulk = intake
        .submit_bulk_scan("robot.json", &mut scans)
        .await
        .expect("submit bulk scan");
    assert_eq!(bulk.status, Status::Pending);
    assert_eq!(bulk.file_name, "robot.json");
    assert_eq!(executor.pending_names(), vec!["scan_ingestion"]);
    assert_eq!(executor.run_all().await, 1);

    let stored = harness.store.bulk_scan_record(bulk.id).await.expect("bulk");
    assert_eq!(stored.status, Status::Completed);

    let mut csv: &[u8] = b"location,item\nL1,B1\nL2,\nL3,B3\n";
    let report = intake
        .request_report("robot.json", "expected.csv", &mut csv)
        .await
        .expect("request report");
    executor.run_all().await;
    let report = intake.report_record(report.id).await.expect("report");
    assert_eq!(report.status, Status::Completed);
    assert_eq!(intake.report_data(report.id).await.expect("data").len(), 3);

    let export = intake
        .request_export(report.id, "json")
        .await
        .expect("request export");
    assert_eq!(export.file_name, format!("report_{}.json", report.id));
    executor.run_all().await;

    let export = intake.completed_export(export.id).await.expect("completed export");
    let contents = std::fs::read_to_string(&export.file_path).expect("read export");
    let parsed: Vec<Value> = serde_json::from_str(&contents).expect("valid export");
    let results: Vec<&str> = parsed
        .iter()
        .map(|row| row["result"].as_str().expect("result text"))
        .collect();
    assert_eq!(
        results,
        vec![
            "The location was occupied by the expected items",
            "The location was empty, as expected",
            "The location was occupied by the wrong items",
        ]
    );
}

#[tokio::test]
async fn report_requires_a_known_completed_bulk_scan() {
    let harness = Harness::new();
    let executor = Arc::new(DeferredExecutor::new());
    let intake = harness.intake(executor.clone(), harness.config(50, 50));

    let mut csv: &[u8] = b"location,item\n";
    let err = intake
        .request_report("unknown.json", "expected.csv", &mut csv)
        .await
        .expect_err("unknown bulk scan");
    assert!(matches!(err, IntakeError::BulkScanNotFound(ref name) if name == "unknown.json"));
    assert!(err.is_not_found());

    let scans = scan_array(1);
    let bulk = intake
        .submit_bulk_scan("pending.json", &mut scans.as_bytes())
        .await
        .expect("submit");

    let mut csv: &[u8] = b"location,item\n";
    let err = intake
        .request_report("pending.json", "expected.csv", &mut csv)
        .await
        .expect_err("bulk scan not processed yet");
    assert!(matches!(err, IntakeError::BulkScanNotCompleted { id, status: Status::Pending } if id == bulk.id));
    assert!(harness.store.list_report_records().await.expect("reports").is_empty());
}

#[tokio::test]
async fn report_uses_the_most_recent_bulk_scan_with_that_name() {
    let harness = Harness::new();
    let executor = Arc::new(DeferredExecutor::new());
    let intake = harness.intake(executor.clone(), harness.config(50, 50));

    let first = intake
        .submit_bulk_scan("robot.json", &mut scan_array(1).as_bytes())
        .await
        .expect("first upload");
    executor.run_all().await;
    let second = intake
        .submit_bulk_scan("robot.json", &mut scan_array(2).as_bytes())
        .await
        .expect("second upload");
    executor.run_all().await;

    let report = intake
        .request_report("robot.json", "expected.csv", &mut &b"location,item\nL1,B\n"[..])
        .await
        .expect("request report");

    assert_ne!(first.id, second.id);
    assert_eq!(report.bulk_scan_record_id, second.id);
}

async fn completed_report(harness: &Harness, executor: &Arc<DeferredExecutor>) -> Uuid {
    let intake = harness.intake(executor.clone(), harness.config(50, 50));
    intake
        .submit_bulk_scan("robot.json", &mut scan_array(3).as_bytes())
        .await
        .expect("upload");
    executor.run_all().await;
    let report = intake
        .request_report("robot.json", "expected.csv", &mut &b"location,item\nL0,B\nL1,\n"[..])
        .await
        .expect("report");
    executor.run_all().await;
    report.id
}

#[tokio::test]
async fn repeated_export_request_returns_the_in_flight_record() {
    let harness = Harness::new();
    let executor = Arc::new(DeferredExecutor::new());
    let report_id = completed_report(&harness, &executor).await;
    let intake = harness.intake(executor.clone(), harness.config(50, 50));

    let first = intake.request_export(report_id, "json").await.expect("first");
    let second = intake.request_export(report_id, "json").await.expect("second");

    assert_eq!(first.id, second.id);
    assert_eq!(executor.pending(), 1);
    executor.run_all().await;

    let third = intake.request_export(report_id, "json").await.expect("third");
    assert_eq!(third.id, first.id);
    assert_eq!(third.status, Status::Completed);
    assert_eq!(executor.pending(), 0);
    assert_eq!(intake.export_records(report_id).await.expect("exports").len(), 1);
}

#[tokio::test]
async fn failed_export_is_replaced_on_the_next_request() {
    let harness = Harness::new();
    let executor = Arc::new(DeferredExecutor::new());
    let report_id = completed_report(&harness, &executor).await;
    let intake = harness.intake(executor.clone(), harness.config(50, 50));

    let first = intake.request_export(report_id, "json").await.expect("first");
    harness.store.fail_comparison_reads(true).await;
    executor.run_all().await;
    let failed = intake.export_record(first.id).await.expect("first export");
    assert_eq!(failed.status, Status::Failed);
    assert!(matches!(
        intake.completed_export(first.id).await,
        Err(IntakeError::ExportNotReady { status: Status::Failed, .. })
    ));

    harness.store.fail_comparison_reads(false).await;
    let retry = intake.request_export(report_id, "json").await.expect("retry");
    assert_ne!(retry.id, first.id);
    executor.run_all().await;

    let retry = intake.completed_export(retry.id).await.expect("retry completes");
    let contents = std::fs::read_to_string(&retry.file_path).expect("read export");
    let parsed: Vec<Value> = serde_json::from_str(&contents).expect("retry file is clean");
    assert_eq!(parsed.len(), 2);
}

#[tokio::test]
async fn unsupported_export_types_are_rejected_up_front() {
    let harness = Harness::new();
    let executor = Arc::new(DeferredExecutor::new());
    let report_id = completed_report(&harness, &executor).await;
    let intake = harness.intake(executor.clone(), harness.config(50, 50));

    for report_type in ["csv", "xml"] {
        let err = intake
            .request_export(report_id, report_type)
            .await
            .expect_err("type is not supported");
        assert!(matches!(err, IntakeError::UnsupportedReportType(ref t) if t == report_type));
    }
    assert_eq!(executor.pending(), 0);
    assert!(!intake.layout().exports_dir.exists());
    assert!(harness
        .store
        .find_export_record(report_id, ExportReportType::Csv)
        .await
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn export_of_unknown_report_is_not_found() {
    let harness = Harness::new();
    let executor = Arc::new(DeferredExecutor::new());
    let intake = harness.intake(executor.clone(), harness.config(50, 50));

    let err = intake
        .request_export(Uuid::new_v4(), "json")
        .await
        .expect_err("unknown report");

    assert!(matches!(
        err,
        IntakeError::Repository(RepositoryError::NotFound(_))
    ));
    assert!(err.is_not_found());
}
