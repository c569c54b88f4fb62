use std::collections::HashMap;
use std::io;

use axum::body::Body;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shelfscan_core::{
    BulkScanRecord, ComparisonData, ExportReportRecord, IntakeError, ReportRecord,
    RepositoryError, Status,
};
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::error;
use uuid::Uuid;

use crate::state::AppState;

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/bulk-scan-records", get(list_bulk_scan_records))
        .route("/upload-bulk-scan-file", post(upload_bulk_scan_file))
        .route(
            "/inventory-comparison-reports",
            get(list_reports).post(create_report),
        )
        .route("/inventory-comparison-reports/{id}", get(get_report))
        .route("/inventory-comparison-reports/{id}/data", get(get_report_data))
        .route(
            "/inventory-comparison-reports/{id}/exports",
            get(list_report_exports),
        )
        .route("/export-report-records", post(create_export))
        .route("/export-report-records/{id}/download", get(download_export))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Error response rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        let status = match &err {
            err if err.is_not_found() => StatusCode::NOT_FOUND,
            IntakeError::BulkScanNotCompleted { .. } => StatusCode::CONFLICT,
            IntakeError::UnsupportedReportType(_) => StatusCode::UNPROCESSABLE_ENTITY,
            IntakeError::ExportNotReady { .. } => StatusCode::ACCEPTED,
            IntakeError::Storage(io_err) if io_err.kind() == io::ErrorKind::InvalidInput => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkScanRecordResponse {
    pub id: Uuid,
    pub file_name: String,
    pub status: Status,
}

impl From<BulkScanRecord> for BulkScanRecordResponse {
    fn from(record: BulkScanRecord) -> Self {
        Self {
            id: record.id,
            file_name: record.file_name,
            status: record.status,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecordResponse {
    pub id: Uuid,
    pub bulk_scan_record_id: Uuid,
    pub bulk_scan_file_name: Option<String>,
    pub reference_file_name: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportRecordResponse {
    fn new(record: ReportRecord, bulk_scan_file_name: Option<String>) -> Self {
        Self {
            id: record.id,
            bulk_scan_record_id: record.bulk_scan_record_id,
            bulk_scan_file_name,
            reference_file_name: record.reference_file_name,
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRowResponse {
    pub location: String,
    pub scanned: bool,
    pub occupied: bool,
    pub actual_barcodes: Vec<String>,
    pub expected_barcodes: Vec<String>,
    pub result: &'static str,
}

impl From<ComparisonData> for ComparisonRowResponse {
    fn from(row: ComparisonData) -> Self {
        Self {
            location: row.location,
            scanned: row.scanned,
            occupied: row.occupied,
            actual_barcodes: row.actual_barcodes,
            expected_barcodes: row.expected_barcodes,
            result: row.result.description(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecordResponse {
    pub id: Uuid,
    pub report_type: String,
    pub file_name: String,
    pub status: Status,
}

impl From<ExportReportRecord> for ExportRecordResponse {
    fn from(record: ExportReportRecord) -> Self {
        Self {
            id: record.id,
            report_type: record.report_type.to_string(),
            file_name: record.file_name,
            status: record.status,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExportRequest {
    pub report_record_id: Uuid,
    pub report_type: String,
}

/// Adapts a multipart field to `AsyncRead` without buffering it whole.
fn field_reader(field: Field<'_>) -> impl tokio::io::AsyncRead + Send + Unpin + '_ {
    StreamReader::new(Box::pin(field.map_err(io::Error::other)))
}

fn upload_name(field: &Field<'_>) -> ApiResult<String> {
    field
        .file_name()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("uploaded file has no file name"))
}

pub async fn list_bulk_scan_records(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<BulkScanRecordResponse>>> {
    let records = state.intake().bulk_scan_records().await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

pub async fn upload_bulk_scan_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<CreatedResponse>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = upload_name(&field)?;
        let mut reader = field_reader(field);
        let record = state
            .intake()
            .submit_bulk_scan(&file_name, &mut reader)
            .await?;
        return Ok(Json(CreatedResponse { id: record.id }));
    }
    Err(ApiError::bad_request("multipart field 'file' is required"))
}

pub async fn list_reports(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ReportRecordResponse>>> {
    let names: HashMap<Uuid, String> = state
        .intake()
        .bulk_scan_records()
        .await?
        .into_iter()
        .map(|record| (record.id, record.file_name))
        .collect();
    let reports = state.intake().report_records().await?;
    Ok(Json(
        reports
            .into_iter()
            .map(|report| {
                let name = names.get(&report.bulk_scan_record_id).cloned();
                ReportRecordResponse::new(report, name)
            })
            .collect(),
    ))
}

/// Expects `bulkScanFileName` before `csvFile` so the scan can be checked
/// before the upload is stored.
pub async fn create_report(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<CreatedResponse>> {
    let mut bulk_scan_file_name: Option<String> = None;
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("bulkScanFileName") => {
                bulk_scan_file_name = Some(field.text().await?.trim().to_string());
            }
            Some("csvFile") => {
                let bulk_scan_file_name = bulk_scan_file_name.take().ok_or_else(|| {
                    ApiError::bad_request("field 'bulkScanFileName' must precede 'csvFile'")
                })?;
                let file_name = upload_name(&field)?;
                let mut reader = field_reader(field);
                let report = state
                    .intake()
                    .request_report(&bulk_scan_file_name, &file_name, &mut reader)
                    .await?;
                return Ok(Json(CreatedResponse { id: report.id }));
            }
            _ => {}
        }
    }
    Err(ApiError::bad_request(
        "multipart fields 'bulkScanFileName' and 'csvFile' are required",
    ))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReportRecordResponse>> {
    let report = state.intake().report_record(id).await?;
    let name = match state.intake().bulk_scan_record(report.bulk_scan_record_id).await {
        Ok(record) => Some(record.file_name),
        Err(IntakeError::Repository(RepositoryError::NotFound(_))) => None,
        Err(err) => return Err(err.into()),
    };
    Ok(Json(ReportRecordResponse::new(report, name)))
}

pub async fn get_report_data(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ComparisonRowResponse>>> {
    let rows = state.intake().report_data(id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

pub async fn list_report_exports(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ExportRecordResponse>>> {
    let exports = state.intake().export_records(id).await?;
    Ok(Json(exports.into_iter().map(Into::into).collect()))
}

pub async fn create_export(
    State(state): State<AppState>,
    Json(request): Json<CreateExportRequest>,
) -> ApiResult<Json<CreatedResponse>> {
    let export = state
        .intake()
        .request_export(request.report_record_id, &request.report_type)
        .await?;
    Ok(Json(CreatedResponse { id: export.id }))
}

pub async fn download_export(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let export = state.intake().completed_export(id).await?;
    let file = tokio::fs::File::open(&export.file_path)
        .await
        .map_err(IntakeError::Storage)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.file_name),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
