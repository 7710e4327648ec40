//! Bill ingestion from uploaded files.
//!
//! An upload runs as a spawned task that reports progress over a `watch`
//! channel and stops at the next file boundary once its cancellation token
//! fires. CSV files are the only format with an extractor; the other accepted
//! formats are validated and then reported as needing manual entry.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::models::{Bill, CreateBillRequest};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Files accepted in a single upload request.
pub const MAX_FILES_PER_UPLOAD: usize = 10;

const REQUEST_OVERHEAD_BYTES: usize = 64 * 1024;

pub const CSV_CONTENT_TYPE: &str = "text/csv";

pub const ACCEPTED_CONTENT_TYPES: [&str; 5] = [
    "application/pdf",
    "image/jpeg",
    "image/png",
    CSV_CONTENT_TYPE,
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// Maps a file extension to one of the accepted content types.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "pdf" => Some(ACCEPTED_CONTENT_TYPES[0]),
        "jpg" | "jpeg" => Some(ACCEPTED_CONTENT_TYPES[1]),
        "png" => Some(ACCEPTED_CONTENT_TYPES[2]),
        "csv" => Some(CSV_CONTENT_TYPE),
        "xlsx" => Some(ACCEPTED_CONTENT_TYPES[4]),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: usize,
}

impl UploadLimits {
    /// Largest request body that can carry a full batch of files, each just
    /// under `max_bytes`, once base64 encoded.
    pub fn request_body_limit(&self) -> usize {
        let encoded_file = self.max_bytes.div_ceil(3) * 4;
        encoded_file
            .saturating_mul(MAX_FILES_PER_UPLOAD)
            .saturating_add(REQUEST_OVERHEAD_BYTES)
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Wire form of an uploaded file; the content is base64 encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFilePayload {
    pub filename: String,
    pub content_type: String,
    pub content_base64: String,
}

impl UploadFilePayload {
    pub fn encode(file: &UploadFile) -> Self {
        Self {
            filename: file.filename.clone(),
            content_type: file.content_type.clone(),
            content_base64: STANDARD.encode(&file.bytes),
        }
    }

    pub fn decode(self) -> AppResult<UploadFile> {
        let bytes = STANDARD.decode(self.content_base64.as_bytes()).map_err(|e| {
            AppError::Validation(format!("{} is not valid base64: {}", self.filename, e))
        })?;
        Ok(UploadFile {
            filename: self.filename,
            content_type: self.content_type,
            bytes,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub files: Vec<UploadFilePayload>,
}

impl UploadRequest {
    pub fn into_files(self) -> AppResult<Vec<UploadFile>> {
        if self.files.len() > MAX_FILES_PER_UPLOAD {
            return Err(AppError::Validation(format!(
                "At most {} files can be uploaded at once, got {}",
                MAX_FILES_PER_UPLOAD,
                self.files.len()
            )));
        }
        self.files.into_iter().map(UploadFilePayload::decode).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadIssue {
    pub file: String,
    pub line: Option<u64>,
    pub message: String,
}

impl UploadIssue {
    fn new(file: &str, line: Option<u64>, message: impl Into<String>) -> Self {
        Self {
            file: file.to_string(),
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    pub success: bool,
    pub message: String,
    pub bills: Vec<Bill>,
    pub errors: Vec<UploadIssue>,
}

/// A running upload.
pub struct UploadHandle {
    progress: watch::Receiver<u8>,
    cancel: CancellationToken,
    task: JoinHandle<AppResult<UploadResult>>,
}

impl UploadHandle {
    /// Percentage of files processed, 0 to 100.
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn join(self) -> AppResult<UploadResult> {
        self.task
            .await
            .map_err(|e| AppError::Upload(format!("upload task failed: {}", e)))?
    }
}

/// Spawns the ingestion of `files` on the current tokio runtime.
pub fn start_upload(files: Vec<UploadFile>, limits: UploadLimits) -> UploadHandle {
    let (progress_tx, progress_rx) = watch::channel(0u8);
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task =
        tokio::spawn(async move { process_files(files, limits, &progress_tx, &token).await });

    UploadHandle {
        progress: progress_rx,
        cancel,
        task,
    }
}

pub async fn process_files(
    files: Vec<UploadFile>,
    limits: UploadLimits,
    progress: &watch::Sender<u8>,
    cancel: &CancellationToken,
) -> AppResult<UploadResult> {
    let total = files.len();
    let mut bills = Vec::new();
    let mut errors = Vec::new();

    tracing::info!(files = total, "starting upload");

    for (i, file) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::warn!(processed = i, files = total, "upload cancelled");
            return Err(AppError::Cancelled);
        }

        match validate_file(file, limits) {
            Ok(()) if file.content_type == CSV_CONTENT_TYPE => {
                let (extracted, issues) = extract_csv(&file.filename, &file.bytes);
                tracing::debug!(
                    file = %file.filename,
                    bills = extracted.len(),
                    issues = issues.len(),
                    "extracted csv"
                );
                bills.extend(extracted);
                errors.extend(issues);
            }
            Ok(()) => errors.push(UploadIssue::new(
                &file.filename,
                None,
                format!(
                    "No extractor available for {}; enter this bill manually",
                    file.content_type
                ),
            )),
            Err(issue) => errors.push(issue),
        }

        let percent = ((i + 1) * 100 / total) as u8;
        let _ = progress.send(percent);
        tokio::task::yield_now().await;
    }

    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    let _ = progress.send(100);

    let success = errors.is_empty() && !bills.is_empty();
    let message = if total == 0 {
        "No files were uploaded".to_string()
    } else if success {
        format!(
            "{} files have been uploaded and processed successfully.",
            total
        )
    } else {
        format!(
            "Processed {} files: {} bills extracted, {} errors",
            total,
            bills.len(),
            errors.len()
        )
    };

    tracing::info!(bills = bills.len(), errors = errors.len(), "upload finished");

    Ok(UploadResult {
        success,
        message,
        bills,
        errors,
    })
}

pub fn validate_file(file: &UploadFile, limits: UploadLimits) -> Result<(), UploadIssue> {
    if !ACCEPTED_CONTENT_TYPES.contains(&file.content_type.as_str()) {
        return Err(UploadIssue::new(
            &file.filename,
            None,
            "You can only upload PDF, Image, CSV or Excel files",
        ));
    }
    if file.bytes.len() >= limits.max_bytes {
        return Err(UploadIssue::new(
            &file.filename,
            None,
            format!("File must be smaller than {} bytes", limits.max_bytes),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CsvBillRow {
    bill_number: String,
    vendor: String,
    amount: f64,
    due_date: String,
    category: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Parses a bill CSV. Each bad row becomes an issue carrying its line number;
/// good rows still produce bills.
pub fn extract_csv(filename: &str, bytes: &[u8]) -> (Vec<Bill>, Vec<UploadIssue>) {
    let mut bills = Vec::new();
    let mut issues = Vec::new();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            issues.push(UploadIssue::new(filename, Some(1), format!("Unreadable header: {}", e)));
            return (bills, issues);
        }
    };

    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line());
                issues.push(UploadIssue::new(filename, line, e.to_string()));
                continue;
            }
        };
        let line = record.position().map(|p| p.line());

        let row: CsvBillRow = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(e) => {
                issues.push(UploadIssue::new(filename, line, e.to_string()));
                continue;
            }
        };

        let request = CreateBillRequest {
            bill_number: row.bill_number,
            vendor: row.vendor,
            amount: row.amount,
            due_date: row.due_date,
            category: row.category,
            description: row.description,
            status: row.status.filter(|s| !s.is_empty()),
            attachments: vec![filename.to_string()],
        };

        match request.into_bill() {
            Ok(bill) => bills.push(bill),
            Err(e) => issues.push(UploadIssue::new(filename, line, e.to_string())),
        }
    }

    (bills, issues)
}
