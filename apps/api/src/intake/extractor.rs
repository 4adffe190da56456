//! Document Text Extractor: PDF and DOCX binaries to plain text.
//!
//! PDF goes through `pdf-extract`; DOCX is unzipped and `word/document.xml`
//! is walked with `quick-xml`, keeping `<w:t>` runs and turning paragraphs,
//! breaks and tabs into whitespace. No OCR: an image-only PDF yields "".

use std::io::{Cursor, Read};
use std::path::Path;

use bytes::Bytes;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use thiserror::Error;

const PDF_MIME: &str = "application/pdf";
const DOC_MIME: &str = "application/msword";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}. Only PDF and DOC/DOCX files are accepted")]
    UnsupportedFormat(String),

    #[error("Failed to extract text: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocumentFormat {
    Pdf,
    Doc,
    Docx,
}

impl DocumentFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            PDF_MIME => Some(Self::Pdf),
            DOC_MIME => Some(Self::Doc),
            DOCX_MIME => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn from_extension(filename: &str) -> Option<Self> {
        let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    /// Browsers send `application/octet-stream` for unknown types, so the
    /// extension is consulted only when the MIME type is absent or generic.
    pub fn detect(content_type: Option<&str>, filename: &str) -> Option<Self> {
        match content_type {
            Some(ct) if !ct.starts_with("application/octet-stream") => Self::from_mime(ct),
            _ => Self::from_extension(filename),
        }
    }
}

/// Extracts text on the blocking pool. A panic inside the PDF parser is
/// reported as `Failed` rather than taking the request down.
pub async fn extract_text(bytes: Bytes, format: DocumentFormat) -> Result<String, ExtractionError> {
    tokio::task::spawn_blocking(move || extract_text_sync(&bytes, format))
        .await
        .map_err(|e| ExtractionError::Failed(format!("extractor crashed: {e}")))?
}

/// Reads a staged upload from disk and extracts it.
pub async fn extract_file(path: &Path, format: DocumentFormat) -> Result<String, ExtractionError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ExtractionError::Failed(format!("could not read staged upload: {e}")))?;
    extract_text(Bytes::from(bytes), format).await
}

pub fn extract_text_sync(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractionError> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Docx => extract_docx(bytes),
        // Word sometimes labels .docx files as application/msword; sniff the container.
        DocumentFormat::Doc if bytes.starts_with(ZIP_MAGIC) => extract_docx(bytes),
        DocumentFormat::Doc if bytes.starts_with(OLE_MAGIC) => Err(ExtractionError::Failed(
            "legacy binary .doc files are not supported, save the resume as .docx or .pdf".into(),
        )),
        DocumentFormat::Doc => Err(ExtractionError::Failed("not a Word document".into())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ExtractionError::Failed(format!("invalid PDF: {e}")))?;
    Ok(text.trim().to_string())
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::Failed(format!("invalid DOCX container: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractionError::Failed(format!("DOCX has no document body: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::Failed(format!("unreadable DOCX body: {e}")))?;

    docx_body_text(&xml)
}

fn docx_body_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_run = false;
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"r" => in_run = true,
                b"t" => in_text_run = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"r" => in_run = false,
                b"t" => in_text_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            // Tab stops in paragraph properties are also <w:tab/>; only runs count.
            Ok(Event::Empty(e)) if in_run => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractionError::Failed(format!("malformed DOCX XML: {e}")))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ExtractionError::Failed(format!(
                    "malformed DOCX XML at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    Ok(out.trim().to_string())
}
