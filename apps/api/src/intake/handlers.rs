use std::collections::HashMap;

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::RecruiterIdentity;
use crate::errors::AppError;
use crate::intake::extractor::{extract_file, extract_text, DocumentFormat, ExtractionError};
use crate::intake::storage::{object_key, public_url, put_resume, stage_upload};
use crate::intake::validator::is_likely_resume;
use crate::screening::batch::NOT_A_RESUME_WARNING;
use crate::state::AppState;

pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_BATCH_FILES: usize = 10;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn format(&self) -> Result<DocumentFormat, ExtractionError> {
        DocumentFormat::detect(self.content_type.as_deref(), &self.filename).ok_or_else(|| {
            ExtractionError::UnsupportedFormat(
                self.content_type
                    .clone()
                    .unwrap_or_else(|| self.filename.clone()),
            )
        })
    }
}

/// Files from one multipart field plus every plain text field.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub files: Vec<UploadedFile>,
    pub fields: HashMap<String, String>,
}

/// Drains `multipart`, keeping files sent under `file_field` and text fields.
pub async fn read_multipart(multipart: &mut Multipart, file_field: &str) -> Result<MultipartForm, AppError> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        match filename {
            Some(filename) if name == file_field => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid file {filename}: {e}")))?;
                if bytes.len() > MAX_FILE_BYTES {
                    return Err(AppError::Validation(format!(
                        "File {filename} exceeds the 10 MB limit"
                    )));
                }
                form.files.push(UploadedFile {
                    filename,
                    content_type,
                    bytes,
                });
            }
            Some(filename) => warn!("Ignoring file {filename} sent under field '{name}'"),
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid field {name}: {e}")))?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_url: String,
    pub text: String,
}

/// POST /resumes
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let form = read_multipart(&mut multipart, "resume").await?;
    let file = form.files.into_iter().next().ok_or(AppError::NoFilesProvided)?;
    let format = file.format()?;

    let text = extract_text(file.bytes.clone(), format).await?;

    let key = object_key(&file.filename, chrono::Utc::now().timestamp_millis());
    let content_type = file
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    put_resume(&state.s3, &state.config.s3_bucket, &key, file.bytes, content_type).await?;

    let file_url = public_url(
        state.config.s3_endpoint.as_deref(),
        &state.config.s3_bucket,
        &state.config.aws_region,
        &key,
    );
    info!("Stored {} ({} chars extracted)", file.filename, text.len());
    Ok(Json(UploadResponse { file_url, text }))
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ExtractedEntry {
    Extracted { filename: String, text: String },
    Failed { filename: String, error: String },
}

#[derive(Debug, Serialize)]
pub struct BatchUploadResponse {
    pub data: Vec<ExtractedEntry>,
    /// Files whose text passed the resume check.
    pub accepted: Vec<String>,
    pub warnings: Vec<String>,
}

/// POST /resumes/batch
pub async fn handle_batch_upload(
    State(state): State<AppState>,
    identity: RecruiterIdentity,
    mut multipart: Multipart,
) -> Result<Json<BatchUploadResponse>, AppError> {
    let form = read_multipart(&mut multipart, "resumes").await?;
    if form.files.is_empty() {
        return Err(AppError::NoFilesProvided);
    }
    if form.files.len() > MAX_BATCH_FILES {
        return Err(AppError::Validation(format!(
            "At most {MAX_BATCH_FILES} files can be uploaded at once"
        )));
    }
    info!(
        "Recruiter {} uploading {} resumes",
        identity.recruiter_id,
        form.files.len()
    );

    let mut response = BatchUploadResponse {
        data: Vec::with_capacity(form.files.len()),
        accepted: Vec::new(),
        warnings: Vec::new(),
    };

    for file in form.files {
        let filename = file.filename.clone();
        match extract_staged(&state, &file).await {
            Ok(text) => {
                if is_likely_resume(&text) {
                    response.accepted.push(filename.clone());
                } else {
                    warn!("{filename} does not look like a resume");
                    if response.warnings.is_empty() {
                        response.warnings.push(NOT_A_RESUME_WARNING.to_string());
                    }
                }
                response.data.push(ExtractedEntry::Extracted { filename, text });
            }
            Err(e) => {
                warn!("Extraction of {filename} failed: {e}");
                let error = match e {
                    ExtractionError::UnsupportedFormat(_) => e.to_string(),
                    ExtractionError::Failed(_) => "Failed to process resume".to_string(),
                };
                response.data.push(ExtractedEntry::Failed { filename, error });
            }
        }
    }

    Ok(Json(response))
}

/// Stages the upload on disk, extracts it, and removes the staged copy.
async fn extract_staged(state: &AppState, file: &UploadedFile) -> Result<String, ExtractionError> {
    let format = file.format()?;
    let staged = stage_upload(&state.config.upload_dir, &file.bytes)
        .await
        .map_err(|e| ExtractionError::Failed(format!("staging {} failed: {e}", file.filename)))?;
    let text = extract_file(staged.path(), format).await;
    drop(staged);
    text
}
