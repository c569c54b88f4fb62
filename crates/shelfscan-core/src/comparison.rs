//! Comparison of a reference inventory CSV against ingested scans.

use std::path::PathBuf;
use std::sync::Arc;

use shelfscan_parser::{ParserError, ReferenceReader, ReferenceRow};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::events::{EventSink, PipelineEvent, PipelineKind};
use crate::models::{ComparisonData, ComparisonOutcome, ReportRecord, Scan};
use crate::status::{ActiveRun, RunReport};
use crate::store::RecordStore;

/// Classifies one location. Rules apply in order: an unoccupied location
/// only depends on whether something was expected; an occupied location
/// with no readable barcode is unidentified; otherwise exactly one detected
/// barcode equal to the expected one is a match and anything else is wrong.
pub fn classify(scan: &Scan, expected: Option<&str>) -> ComparisonOutcome {
    match (scan.occupied, scan.barcodes.as_slice(), expected) {
        (false, _, None) => ComparisonOutcome::EmptyAsExpected,
        (false, _, Some(_)) => ComparisonOutcome::EmptyButExpectedOccupied,
        (true, [], _) => ComparisonOutcome::OccupiedButBarcodeNotIdentified,
        (true, _, None) => ComparisonOutcome::OccupiedButExpectedEmpty,
        (true, [actual], Some(expected)) if actual == expected => {
            ComparisonOutcome::OccupiedWithExpectedItems
        }
        (true, _, Some(_)) => ComparisonOutcome::OccupiedWithWrongItems,
    }
}

#[derive(Clone)]
pub struct ComparisonEngine {
    store: Arc<dyn RecordStore>,
    events: Arc<dyn EventSink>,
    channel_capacity: usize,
}

impl ComparisonEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        events: Arc<dyn EventSink>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            events,
            channel_capacity: config.reference_channel_capacity.max(1),
        }
    }

    pub async fn generate(&self, report: &ReportRecord) -> RunReport {
        let mut run = match ActiveRun::begin(
            self.store.as_ref(),
            self.events.as_ref(),
            PipelineKind::Comparison,
            report.record_ref(),
        )
        .await
        {
            Ok(run) => run,
            Err(rejected) => return rejected,
        };

        let result = self.compare(&mut run, report).await;
        run.finish(result).await
    }

    async fn compare(&self, run: &mut ActiveRun<'_>, report: &ReportRecord) -> Result<()> {
        let mut rows =
            ReferenceStream::open(report.reference_file_path.clone(), self.channel_capacity);

        while let Some(row) = rows.next().await? {
            let scan = self
                .store
                .find_scan(report.bulk_scan_record_id, &row.location)
                .await?
                .ok_or_else(|| PipelineError::ScanNotFound {
                    bulk_scan_record_id: report.bulk_scan_record_id,
                    location: row.location.clone(),
                })?;

            let result = classify(&scan, row.expected_barcode.as_deref());
            let data = ComparisonData {
                report_record_id: report.id,
                expected_barcodes: row.expected_barcodes(),
                location: row.location,
                scanned: scan.scanned,
                occupied: scan.occupied,
                actual_barcodes: scan.barcodes,
                result,
            };
            self.store.insert_comparison_row(&data).await?;

            run.add_rows(1);
            run.events().emit(PipelineEvent::RowCompared {
                record: run.record(),
                location: data.location,
                outcome: result,
            });
        }

        Ok(())
    }
}

/// Reads reference rows on the blocking pool and hands them over a bounded
/// channel, so at most `capacity` rows are buffered.
struct ReferenceStream {
    rows: mpsc::Receiver<std::result::Result<ReferenceRow, ParserError>>,
    reader: Option<JoinHandle<()>>,
}

impl ReferenceStream {
    fn open(path: PathBuf, capacity: usize) -> Self {
        let (tx, rows) = mpsc::channel(capacity);
        let reader = tokio::task::spawn_blocking(move || {
            let reader = match ReferenceReader::open(&path) {
                Ok(reader) => reader,
                Err(err) => {
                    let _ = tx.blocking_send(Err(err));
                    return;
                }
            };
            for row in reader {
                let stop = row.is_err();
                // A closed channel means the run already stopped.
                if tx.blocking_send(row).is_err() || stop {
                    return;
                }
            }
        });

        Self {
            rows,
            reader: Some(reader),
        }
    }

    async fn next(&mut self) -> Result<Option<ReferenceRow>> {
        match self.rows.recv().await {
            Some(row) => Ok(Some(row?)),
            None => {
                if let Some(reader) = self.reader.take() {
                    reader
                        .await
                        .map_err(|err| PipelineError::Reader(err.to_string()))?;
                }
                Ok(None)
            }
        }
    }
}
