//! Export of a report's comparison rows as a JSON array file.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::PipelineConfig;
use crate::error::{io_error, PipelineError, Result};
use crate::events::{EventSink, PipelineEvent, PipelineKind};
use crate::models::{ComparisonData, ExportReportRecord, ExportReportType};
use crate::status::{ActiveRun, RunReport};
use crate::store::RecordStore;

const ROW_INDENT: &[u8] = b"  ";

/// Shape of one element in an exported report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedRow<'a> {
    location: &'a str,
    scanned: bool,
    occupied: bool,
    actual_barcodes: &'a [String],
    expected_barcodes: &'a [String],
    result: &'static str,
}

impl<'a> From<&'a ComparisonData> for ExportedRow<'a> {
    fn from(row: &'a ComparisonData) -> Self {
        Self {
            location: &row.location,
            scanned: row.scanned,
            occupied: row.occupied,
            actual_barcodes: &row.actual_barcodes,
            expected_barcodes: &row.expected_barcodes,
            result: row.result.description(),
        }
    }
}

/// Pretty-prints `row` indented one level, as an element of the top-level array.
fn render_row(row: &ComparisonData) -> Result<Vec<u8>> {
    let mut object = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut object, PrettyFormatter::with_indent(ROW_INDENT));
    ExportedRow::from(row).serialize(&mut serializer)?;

    let mut rendered = Vec::with_capacity(object.len() + ROW_INDENT.len() * 8);
    rendered.extend_from_slice(ROW_INDENT);
    for byte in object {
        rendered.push(byte);
        if byte == b'\n' {
            rendered.extend_from_slice(ROW_INDENT);
        }
    }
    Ok(rendered)
}

#[derive(Clone)]
pub struct ExportStreamer {
    store: Arc<dyn RecordStore>,
    events: Arc<dyn EventSink>,
    page_size: usize,
}

impl ExportStreamer {
    pub fn new(
        store: Arc<dyn RecordStore>,
        events: Arc<dyn EventSink>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            events,
            page_size: config.export_page_size.max(1),
        }
    }

    pub async fn export(&self, export: &ExportReportRecord) -> RunReport {
        let mut run = match ActiveRun::begin(
            self.store.as_ref(),
            self.events.as_ref(),
            PipelineKind::Export,
            export.record_ref(),
        )
        .await
        {
            Ok(run) => run,
            Err(rejected) => return rejected,
        };

        let result = match export.report_type {
            ExportReportType::Json => self.write_json(&mut run, export).await,
            other => Err(PipelineError::UnsupportedReportType(other)),
        };
        run.finish(result).await
    }

    async fn write_json(&self, run: &mut ActiveRun<'_>, export: &ExportReportRecord) -> Result<()> {
        let path = export.file_path.as_path();
        let on_io = io_error(path);
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .await
            .map_err(&on_io)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(b"[\n").await.map_err(&on_io)?;

        let mut offset = 0;
        loop {
            let page = self
                .store
                .comparison_page(export.report_record_id, self.page_size, offset)
                .await?;
            if page.is_empty() {
                break;
            }

            for (index, row) in page.iter().enumerate() {
                if offset + index > 0 {
                    writer.write_all(b",\n").await.map_err(&on_io)?;
                }
                writer.write_all(&render_row(row)?).await.map_err(&on_io)?;
            }
            offset += page.len();
            checkpoint(&mut writer, path).await?;

            run.add_rows(page.len());
            run.events().emit(PipelineEvent::PageWritten {
                record: run.record(),
                rows: page.len(),
                total: run.rows(),
            });
        }

        writer.write_all(b"\n]").await.map_err(&on_io)?;
        checkpoint(&mut writer, path).await
    }
}

/// Flushes buffered bytes and syncs the file to disk.
async fn checkpoint(writer: &mut BufWriter<File>, path: &Path) -> Result<()> {
    writer.flush().await.map_err(io_error(path))?;
    writer.get_ref().sync_all().await.map_err(io_error(path))
}
