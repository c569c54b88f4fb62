use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfscan_parser::ScanEntry;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Completed => "completed",
            Status::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for one reference row compared against its scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOutcome {
    EmptyAsExpected,
    EmptyButExpectedOccupied,
    OccupiedWithExpectedItems,
    OccupiedWithWrongItems,
    OccupiedButExpectedEmpty,
    OccupiedButBarcodeNotIdentified,
}

impl ComparisonOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOutcome::EmptyAsExpected => "empty_as_expected",
            ComparisonOutcome::EmptyButExpectedOccupied => "empty_but_expected_occupied",
            ComparisonOutcome::OccupiedWithExpectedItems => "occupied_with_expected_items",
            ComparisonOutcome::OccupiedWithWrongItems => "occupied_with_wrong_items",
            ComparisonOutcome::OccupiedButExpectedEmpty => "occupied_but_expected_empty",
            ComparisonOutcome::OccupiedButBarcodeNotIdentified => {
                "occupied_but_barcode_not_identified"
            }
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "empty_as_expected" => Some(Self::EmptyAsExpected),
            "empty_but_expected_occupied" => Some(Self::EmptyButExpectedOccupied),
            "occupied_with_expected_items" => Some(Self::OccupiedWithExpectedItems),
            "occupied_with_wrong_items" => Some(Self::OccupiedWithWrongItems),
            "occupied_but_expected_empty" => Some(Self::OccupiedButExpectedEmpty),
            "occupied_but_barcode_not_identified" => Some(Self::OccupiedButBarcodeNotIdentified),
            _ => None,
        }
    }

    /// Human-readable text used in exports and API responses.
    pub fn description(&self) -> &'static str {
        match self {
            ComparisonOutcome::EmptyAsExpected => "The location was empty, as expected",
            ComparisonOutcome::EmptyButExpectedOccupied => {
                "The location was empty, but it should have been occupied"
            }
            ComparisonOutcome::OccupiedWithExpectedItems => {
                "The location was occupied by the expected items"
            }
            ComparisonOutcome::OccupiedWithWrongItems => {
                "The location was occupied by the wrong items"
            }
            ComparisonOutcome::OccupiedButExpectedEmpty => {
                "The location was occupied by an item, but should have been empty"
            }
            ComparisonOutcome::OccupiedButBarcodeNotIdentified => {
                "The location was occupied, but no barcode could be identified"
            }
        }
    }
}

impl fmt::Display for ComparisonOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportReportType {
    Json,
    /// Declared for clients but rejected by intake and the export streamer.
    Csv,
}

impl ExportReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportReportType::Json => "json",
            ExportReportType::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ExportReportType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "json" => Ok(ExportReportType::Json),
            "csv" => Ok(ExportReportType::Csv),
            other => Err(format!("unknown export report type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    BulkScan,
    Report,
    Export,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::BulkScan => "bulk_scan_record",
            RecordKind::Report => "report_record",
            RecordKind::Export => "export_report_record",
        }
    }
}

/// Identifies a status-carrying record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub kind: RecordKind,
    pub id: Uuid,
}

impl RecordRef {
    pub fn bulk_scan(id: Uuid) -> Self {
        Self {
            kind: RecordKind::BulkScan,
            id,
        }
    }

    pub fn report(id: Uuid) -> Self {
        Self {
            kind: RecordKind::Report,
            id,
        }
    }

    pub fn export(id: Uuid) -> Self {
        Self {
            kind: RecordKind::Export,
            id,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkScanRecord {
    pub id: Uuid,
    pub file_name: String,
    pub file_path: PathBuf,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BulkScanRecord {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        let file_path = file_path.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            file_name: base_name(&file_path),
            file_path,
            status: Status::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_ref(&self) -> RecordRef {
        RecordRef::bulk_scan(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scan {
    pub bulk_scan_record_id: Uuid,
    pub location: String,
    pub scanned: bool,
    pub occupied: bool,
    pub barcodes: Vec<String>,
}

impl Scan {
    pub fn from_entry(bulk_scan_record_id: Uuid, entry: ScanEntry) -> Self {
        Self {
            bulk_scan_record_id,
            location: entry.name,
            scanned: entry.scanned,
            occupied: entry.occupied,
            barcodes: entry.detected_barcodes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRecord {
    pub id: Uuid,
    pub bulk_scan_record_id: Uuid,
    pub reference_file_name: String,
    pub reference_file_path: PathBuf,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportRecord {
    pub fn new(bulk_scan_record_id: Uuid, reference_file_path: impl Into<PathBuf>) -> Self {
        let reference_file_path = reference_file_path.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            bulk_scan_record_id,
            reference_file_name: base_name(&reference_file_path),
            reference_file_path,
            status: Status::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_ref(&self) -> RecordRef {
        RecordRef::report(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonData {
    pub report_record_id: Uuid,
    pub location: String,
    pub scanned: bool,
    pub occupied: bool,
    pub actual_barcodes: Vec<String>,
    pub expected_barcodes: Vec<String>,
    pub result: ComparisonOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReportRecord {
    pub id: Uuid,
    pub report_record_id: Uuid,
    pub report_type: ExportReportType,
    pub file_name: String,
    pub file_path: PathBuf,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExportReportRecord {
    pub fn new(
        report_record_id: Uuid,
        report_type: ExportReportType,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        let file_path = file_path.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            report_record_id,
            report_type,
            file_name: base_name(&file_path),
            file_path,
            status: Status::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_ref(&self) -> RecordRef {
        RecordRef::export(self.id)
    }

    /// File name used for the export of `report_record_id`.
    pub fn file_name_for(report_record_id: Uuid, report_type: ExportReportType) -> String {
        format!("report_{report_record_id}.{}", report_type.as_str())
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
