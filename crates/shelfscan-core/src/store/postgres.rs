use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{RecordStore, RepositoryError};
use crate::models::{
    BulkScanRecord, ComparisonData, ComparisonOutcome, ExportReportRecord, ExportReportType,
    RecordKind, RecordRef, ReportRecord, Scan, Status,
};

/// Postgres bind parameters are capped at 65535 per statement; five per scan.
const MAX_SCANS_PER_STATEMENT: usize = 10_000;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn current_status(&self, record: RecordRef) -> Result<Option<Status>, RepositoryError> {
        let query = format!("SELECT status FROM {} WHERE id = $1", table_for(record.kind));
        let row = sqlx::query(&query)
            .bind(record.id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| parse_status(row.try_get("status")?))
            .transpose()
    }
}

fn table_for(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::BulkScan => "bulk_scan_records",
        RecordKind::Report => "report_records",
        RecordKind::Export => "export_report_records",
    }
}

fn parse_status(value: String) -> Result<Status, RepositoryError> {
    Status::from_str(&value).ok_or(RepositoryError::InvalidValue {
        field: "status",
        value,
    })
}

fn path_text(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Turns unique violations into `Duplicate` so callers can react to them.
fn map_insert_error(entity: &'static str, key: String) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |err| match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            RepositoryError::Duplicate { entity, key }
        }
        _ => RepositoryError::Database(err),
    }
}

fn bulk_scan_from_row(row: &PgRow) -> Result<BulkScanRecord, RepositoryError> {
    let file_path: String = row.try_get("file_path")?;
    Ok(BulkScanRecord {
        id: row.try_get("id")?,
        file_name: row.try_get("file_name")?,
        file_path: PathBuf::from(file_path),
        status: parse_status(row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn report_from_row(row: &PgRow) -> Result<ReportRecord, RepositoryError> {
    let reference_file_path: String = row.try_get("reference_file_path")?;
    Ok(ReportRecord {
        id: row.try_get("id")?,
        bulk_scan_record_id: row.try_get("bulk_scan_record_id")?,
        reference_file_name: row.try_get("reference_file_name")?,
        reference_file_path: PathBuf::from(reference_file_path),
        status: parse_status(row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn comparison_from_row(row: &PgRow) -> Result<ComparisonData, RepositoryError> {
    let result: String = row.try_get("result")?;
    let result = ComparisonOutcome::from_str(&result).ok_or(RepositoryError::InvalidValue {
        field: "result",
        value: result.clone(),
    })?;
    Ok(ComparisonData {
        report_record_id: row.try_get("report_record_id")?,
        location: row.try_get("location")?,
        scanned: row.try_get("scanned")?,
        occupied: row.try_get("occupied")?,
        actual_barcodes: row.try_get("actual_barcodes")?,
        expected_barcodes: row.try_get("expected_barcodes")?,
        result,
    })
}

fn export_from_row(row: &PgRow) -> Result<ExportReportRecord, RepositoryError> {
    let report_type: String = row.try_get("report_type")?;
    let report_type = ExportReportType::try_from(report_type.as_str()).map_err(|_| {
        RepositoryError::InvalidValue {
            field: "report_type",
            value: report_type.clone(),
        }
    })?;
    let file_path: String = row.try_get("file_path")?;
    Ok(ExportReportRecord {
        id: row.try_get("id")?,
        report_record_id: row.try_get("report_record_id")?,
        report_type,
        file_name: row.try_get("file_name")?,
        file_path: PathBuf::from(file_path),
        status: parse_status(row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn insert_bulk_scan_record(&self, record: &BulkScanRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO bulk_scan_records (id, file_name, file_path, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(&record.file_name)
        .bind(path_text(&record.file_path))
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn bulk_scan_record(&self, id: Uuid) -> Result<BulkScanRecord, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, file_name, file_path, status, created_at, updated_at
            FROM bulk_scan_records
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => bulk_scan_from_row(&row),
            None => Err(RepositoryError::NotFound(RecordRef::bulk_scan(id))),
        }
    }

    async fn find_bulk_scan_record(
        &self,
        file_name: &str,
    ) -> Result<Option<BulkScanRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, file_name, file_path, status, created_at, updated_at
            FROM bulk_scan_records
            WHERE file_name = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(bulk_scan_from_row).transpose()
    }

    async fn list_bulk_scan_records(&self) -> Result<Vec<BulkScanRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, file_name, file_path, status, created_at, updated_at
            FROM bulk_scan_records
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(bulk_scan_from_row).collect()
    }

    async fn insert_scans(&self, scans: &[Scan]) -> Result<(), RepositoryError> {
        if scans.is_empty() {
            return Ok(());
        }

        let key = scans
            .first()
            .map(|scan| scan.bulk_scan_record_id.to_string())
            .unwrap_or_default();
        let mut tx = self.pool.begin().await?;
        for chunk in scans.chunks(MAX_SCANS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO scans (bulk_scan_record_id, location, scanned, occupied, barcodes) ",
            );
            builder.push_values(chunk, |mut values, scan| {
                values
                    .push_bind(scan.bulk_scan_record_id)
                    .push_bind(&scan.location)
                    .push_bind(scan.scanned)
                    .push_bind(scan.occupied)
                    .push_bind(&scan.barcodes);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(map_insert_error("scan", key.clone()))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_scan(
        &self,
        bulk_scan_record_id: Uuid,
        location: &str,
    ) -> Result<Option<Scan>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT bulk_scan_record_id, location, scanned, occupied, barcodes
            FROM scans
            WHERE bulk_scan_record_id = $1 AND location = $2
            "#,
        )
        .bind(bulk_scan_record_id)
        .bind(location)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Scan {
                bulk_scan_record_id: row.try_get("bulk_scan_record_id")?,
                location: row.try_get("location")?,
                scanned: row.try_get("scanned")?,
                occupied: row.try_get("occupied")?,
                barcodes: row.try_get("barcodes")?,
            })),
            None => Ok(None),
        }
    }

    async fn insert_report_record(&self, record: &ReportRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO report_records (
                id,
                bulk_scan_record_id,
                reference_file_name,
                reference_file_path,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.bulk_scan_record_id)
        .bind(&record.reference_file_name)
        .bind(path_text(&record.reference_file_path))
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn report_record(&self, id: Uuid) -> Result<ReportRecord, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, bulk_scan_record_id, reference_file_name, reference_file_path,
                   status, created_at, updated_at
            FROM report_records
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => report_from_row(&row),
            None => Err(RepositoryError::NotFound(RecordRef::report(id))),
        }
    }

    async fn list_report_records(&self) -> Result<Vec<ReportRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, bulk_scan_record_id, reference_file_name, reference_file_path,
                   status, created_at, updated_at
            FROM report_records
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(report_from_row).collect()
    }

    async fn insert_comparison_row(&self, row: &ComparisonData) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO comparison_data (
                report_record_id,
                location,
                scanned,
                occupied,
                actual_barcodes,
                expected_barcodes,
                result
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(row.report_record_id)
        .bind(&row.location)
        .bind(row.scanned)
        .bind(row.occupied)
        .bind(&row.actual_barcodes)
        .bind(&row.expected_barcodes)
        .bind(row.result.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn comparison_page(
        &self,
        report_record_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ComparisonData>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT report_record_id, location, scanned, occupied,
                   actual_barcodes, expected_barcodes, result
            FROM comparison_data
            WHERE report_record_id = $1
            ORDER BY seq
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(report_record_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(comparison_from_row).collect()
    }

    async fn insert_export_record(
        &self,
        record: &ExportReportRecord,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO export_report_records (
                id,
                report_record_id,
                report_type,
                file_name,
                file_path,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.report_record_id)
        .bind(record.report_type.as_str())
        .bind(&record.file_name)
        .bind(path_text(&record.file_path))
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error(
            "export report record",
            format!("{}/{}", record.report_record_id, record.report_type),
        ))?;
        Ok(())
    }

    async fn export_record(&self, id: Uuid) -> Result<ExportReportRecord, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, report_record_id, report_type, file_name, file_path,
                   status, created_at, updated_at
            FROM export_report_records
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => export_from_row(&row),
            None => Err(RepositoryError::NotFound(RecordRef::export(id))),
        }
    }

    async fn find_export_record(
        &self,
        report_record_id: Uuid,
        report_type: ExportReportType,
    ) -> Result<Option<ExportReportRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, report_record_id, report_type, file_name, file_path,
                   status, created_at, updated_at
            FROM export_report_records
            WHERE report_record_id = $1 AND report_type = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(report_record_id)
        .bind(report_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(export_from_row).transpose()
    }

    async fn list_export_records(
        &self,
        report_record_id: Uuid,
    ) -> Result<Vec<ExportReportRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, report_record_id, report_type, file_name, file_path,
                   status, created_at, updated_at
            FROM export_report_records
            WHERE report_record_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(report_record_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(export_from_row).collect()
    }

    async fn transition_status(
        &self,
        record: RecordRef,
        from: Status,
        to: Status,
    ) -> Result<(), RepositoryError> {
        let query = format!(
            "UPDATE {} SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
            table_for(record.kind)
        );
        let result = sqlx::query(&query)
            .bind(to.as_str())
            .bind(Utc::now())
            .bind(record.id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.current_status(record).await? {
            Some(actual) => Err(RepositoryError::StatusConflict {
                record,
                expected: from,
                actual,
            }),
            None => Err(RepositoryError::NotFound(record)),
        }
    }
}
