mod common;

use common::Harness;
use serde_json::Value;
use shelfscan_core::{
    ComparisonData, ComparisonOutcome, ExportReportRecord, ExportReportType, ExportStreamer,
    PipelineEvent, RecordStore, RunOutcome, Status,
};
use uuid::Uuid;

fn row(report_record_id: Uuid, index: usize) -> ComparisonData {
    ComparisonData {
        report_record_id,
        location: format!("L{index}"),
        scanned: true,
        occupied: index % 2 == 0,
        actual_barcodes: if index % 2 == 0 { vec![format!("B{index}")] } else { Vec::new() },
        expected_barcodes: vec![format!("B{index}")],
        result: if index % 2 == 0 {
            ComparisonOutcome::OccupiedWithExpectedItems
        } else {
            ComparisonOutcome::EmptyButExpectedOccupied
        },
    }
}

async fn seeded_export(
    harness: &Harness,
    rows: usize,
    report_type: ExportReportType,
) -> ExportReportRecord {
    let report_record_id = Uuid::new_v4();
    for index in 0..rows {
        harness
            .store
            .insert_comparison_row(&row(report_record_id, index))
            .await
            .expect("seed comparison row");
    }
    let file_name = ExportReportRecord::file_name_for(report_record_id, report_type);
    let export = ExportReportRecord::new(
        report_record_id,
        report_type,
        harness.write_file(&file_name, ""),
    );
    harness
        .store
        .insert_export_record(&export)
        .await
        .expect("insert export record");
    export
}

fn streamer(harness: &Harness, page_size: usize) -> ExportStreamer {
    ExportStreamer::new(
        harness.store.clone(),
        harness.events.clone(),
        &harness.config(50, page_size),
    )
}

#[tokio::test]
async fn export_round_trips_every_row_in_order() {
    for (rows, page_size) in [(1, 50), (7, 3), (6, 3), (120, 50)] {
        let harness = Harness::new();
        let export = seeded_export(&harness, rows, ExportReportType::Json).await;

        let report = streamer(&harness, page_size).export(&export).await;

        assert_eq!(report.outcome, RunOutcome::Completed { rows });
        let contents = std::fs::read_to_string(&export.file_path).expect("read export");
        let parsed: Vec<Value> = serde_json::from_str(&contents).expect("export is a JSON array");
        assert_eq!(parsed.len(), rows);
        for (index, object) in parsed.iter().enumerate() {
            assert_eq!(object["location"], format!("L{index}"));
        }
        let pages = harness
            .events()
            .into_iter()
            .filter(|event| matches!(event, PipelineEvent::PageWritten { .. }))
            .count();
        assert_eq!(pages, rows.div_ceil(page_size));
        let stored = harness.store.export_record(export.id).await.expect("export");
        assert_eq!(stored.status, Status::Completed);
    }
}

#[tokio::test]
async fn exported_objects_use_camel_case_and_readable_results() {
    let harness = Harness::new();
    let export = seeded_export(&harness, 2, ExportReportType::Json).await;

    streamer(&harness, 50).export(&export).await;

    let contents = std::fs::read_to_string(&export.file_path).expect("read export");
    let expected = r#"[
  {
    "location": "L0",
    "scanned": true,
    "occupied": true,
    "actualBarcodes": [
      "B0"
    ],
    "expectedBarcodes": [
      "B0"
    ],
    "result": "The location was occupied by the expected items"
  },
  {
    "location": "L1",
    "scanned": true,
    "occupied": false,
    "actualBarcodes": [],
    "expectedBarcodes": [
      "B1"
    ],
    "result": "The location was empty, but it should have been occupied"
  }
]"#;
    assert_eq!(contents, expected);
}

#[tokio::test]
async fn empty_report_exports_an_empty_array() {
    let harness = Harness::new();
    let export = seeded_export(&harness, 0, ExportReportType::Json).await;

    let report = streamer(&harness, 50).export(&export).await;

    assert_eq!(report.outcome, RunOutcome::Completed { rows: 0 });
    let contents = std::fs::read_to_string(&export.file_path).expect("read export");
    assert_eq!(contents, "[\n\n]");
    let parsed: Vec<Value> = serde_json::from_str(&contents).expect("valid JSON");
    assert!(parsed.is_empty());
}

#[tokio::test]
async fn export_reads_rows_of_its_own_report_only() {
    let harness = Harness::new();
    let export = seeded_export(&harness, 3, ExportReportType::Json).await;
    let other = seeded_export(&harness, 5, ExportReportType::Json).await;

    streamer(&harness, 2).export(&export).await;

    let contents = std::fs::read_to_string(&export.file_path).expect("read export");
    let parsed: Vec<Value> = serde_json::from_str(&contents).expect("valid JSON");
    assert_eq!(parsed.len(), 3);
    assert_ne!(export.report_record_id, other.report_record_id);
}

#[tokio::test]
async fn page_read_failure_leaves_incomplete_file_and_failed_record() {
    let harness = Harness::new();
    let export = seeded_export(&harness, 3, ExportReportType::Json).await;
    harness.store.fail_comparison_reads(true).await;

    let report = streamer(&harness, 50).export(&export).await;

    assert!(report.is_failed());
    let contents = std::fs::read_to_string(&export.file_path).expect("read export");
    assert!(serde_json::from_str::<Value>(&contents).is_err());
    let stored = harness.store.export_record(export.id).await.expect("export");
    assert_eq!(stored.status, Status::Failed);
}

#[tokio::test]
async fn missing_target_file_fails_the_export() {
    let harness = Harness::new();
    let export = seeded_export(&harness, 1, ExportReportType::Json).await;
    std::fs::remove_file(&export.file_path).expect("remove export file");

    let report = streamer(&harness, 50).export(&export).await;

    assert!(report.is_failed());
    assert!(!export.file_path.exists());
}

#[tokio::test]
async fn csv_exports_are_rejected_explicitly() {
    let harness = Harness::new();
    let export = seeded_export(&harness, 2, ExportReportType::Csv).await;

    let report = streamer(&harness, 50).export(&export).await;

    match report.outcome {
        RunOutcome::Failed { error, .. } => assert!(error.contains("csv")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    let contents = std::fs::read_to_string(&export.file_path).expect("read export");
    assert!(contents.is_empty());
    let stored = harness.store.export_record(export.id).await.expect("export");
    assert_eq!(stored.status, Status::Failed);
}
