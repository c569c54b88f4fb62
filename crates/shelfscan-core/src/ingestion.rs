//! Bulk scan ingestion: stream a JSON array of scans into the store in batches.

use std::sync::Arc;

use shelfscan_parser::{JsonArrayReader, ScanEntry};
use tokio::fs::File;
use tokio::io::BufReader;

use crate::config::PipelineConfig;
use crate::error::{io_error, Result};
use crate::events::{EventSink, PipelineEvent, PipelineKind};
use crate::models::{BulkScanRecord, Scan};
use crate::status::{ActiveRun, RunReport};
use crate::store::RecordStore;

const READ_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct ScanIngestion {
    store: Arc<dyn RecordStore>,
    events: Arc<dyn EventSink>,
    batch_size: usize,
}

impl ScanIngestion {
    pub fn new(
        store: Arc<dyn RecordStore>,
        events: Arc<dyn EventSink>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            events,
            batch_size: config.scan_batch_size.max(1),
        }
    }

    pub async fn process(&self, record: &BulkScanRecord) -> RunReport {
        let mut run = match ActiveRun::begin(
            self.store.as_ref(),
            self.events.as_ref(),
            PipelineKind::ScanIngestion,
            record.record_ref(),
        )
        .await
        {
            Ok(run) => run,
            Err(rejected) => return rejected,
        };

        let result = self.ingest(&mut run, record).await;
        run.finish(result).await
    }

    async fn ingest(&self, run: &mut ActiveRun<'_>, record: &BulkScanRecord) -> Result<()> {
        let file = File::open(&record.file_path)
            .await
            .map_err(io_error(&record.file_path))?;
        let mut reader = JsonArrayReader::new(BufReader::with_capacity(READ_BUFFER_BYTES, file));
        reader.open().await?;

        let mut batch: Vec<Scan> = Vec::with_capacity(self.batch_size);
        while reader.has_next().await? {
            let entry: ScanEntry = reader.next_element().await?;
            batch.push(Scan::from_entry(record.id, entry));
            if batch.len() >= self.batch_size {
                self.flush(run, &mut batch).await?;
            }
        }
        if !batch.is_empty() {
            self.flush(run, &mut batch).await?;
        }

        reader.close().await?;
        Ok(())
    }

    async fn flush(&self, run: &mut ActiveRun<'_>, batch: &mut Vec<Scan>) -> Result<()> {
        self.store.insert_scans(batch).await?;
        run.add_rows(batch.len());
        run.events().emit(PipelineEvent::ScanBatchFlushed {
            record: run.record(),
            rows: batch.len(),
            total: run.rows(),
        });
        batch.clear();
        Ok(())
    }
}
