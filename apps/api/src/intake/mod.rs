// Resume intake: uploaded binaries → plain text → "is this a resume?" verdict.
// Extraction is synchronous parsing work and runs on the blocking pool.

pub mod extractor;
pub mod handlers;
pub mod storage;
pub mod validator;

use bytes::Bytes;
use serde::Serialize;

use crate::intake::extractor::{extract_text, DocumentFormat, ExtractionError};
use crate::intake::validator::is_likely_resume;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationState {
    Unvalidated,
    Valid,
    RejectedNotAResume,
    RejectedUnsupportedType,
}

/// One uploaded resume moving through the pipeline.
///
/// Documents built from pasted text start with `extracted_text` populated and
/// empty `raw_bytes`.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub filename: String,
    pub raw_bytes: Bytes,
    pub format: Option<DocumentFormat>,
    pub extracted_text: Option<String>,
    pub validation_state: ValidationState,
}

impl ResumeDocument {
    /// Wraps an upload; an unrecognised type is rejected up front.
    pub fn from_upload(filename: impl Into<String>, content_type: Option<&str>, raw_bytes: Bytes) -> Self {
        let filename = filename.into();
        let format = DocumentFormat::detect(content_type, &filename);
        let validation_state = if format.is_some() {
            ValidationState::Unvalidated
        } else {
            ValidationState::RejectedUnsupportedType
        };
        Self {
            filename,
            raw_bytes,
            format,
            extracted_text: None,
            validation_state,
        }
    }

    pub fn from_text(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            raw_bytes: Bytes::new(),
            format: None,
            extracted_text: Some(text.into()),
            validation_state: ValidationState::Unvalidated,
        }
    }

    /// Extracts text if needed, then runs the resume heuristic.
    /// Returns the text of a document that passed validation. The upload
    /// bytes are released once extraction has been attempted.
    pub async fn prepare(&mut self) -> Result<&str, IntakeError> {
        if self.extracted_text.is_none() {
            let Some(format) = self.format else {
                self.validation_state = ValidationState::RejectedUnsupportedType;
                return Err(IntakeError::Extraction(ExtractionError::UnsupportedFormat(
                    self.filename.clone(),
                )));
            };
            let raw_bytes = std::mem::take(&mut self.raw_bytes);
            let text = extract_text(raw_bytes, format).await?;
            self.extracted_text = Some(text);
        }

        let text = self.extracted_text.as_deref().unwrap_or_default();
        if is_likely_resume(text) {
            self.validation_state = ValidationState::Valid;
            Ok(text)
        } else {
            self.validation_state = ValidationState::RejectedNotAResume;
            Err(IntakeError::NotAResume)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("File does not appear to be a resume")]
    NotAResume,
}
