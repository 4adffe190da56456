use std::path::Path;

use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tempfile::NamedTempFile;
use tracing::info;

use crate::errors::AppError;

/// S3 key for an uploaded resume: `resumes/<unix-millis>_<sanitized filename>`.
pub fn object_key(filename: &str, unix_millis: i64) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("resumes/{unix_millis}_{safe}")
}

/// Public URL of an object: path-style for custom endpoints (MinIO),
/// virtual-hosted style for AWS.
pub fn public_url(endpoint: Option<&str>, bucket: &str, region: &str, key: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/')),
        None => format!("https://{bucket}.s3.{region}.amazonaws.com/{key}"),
    }
}

pub async fn put_resume(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    bytes: Bytes,
    content_type: &str,
) -> Result<(), AppError> {
    let size = bytes.len();
    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(bytes))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("upload of {key} failed: {e}")))?;

    info!("Uploaded resume to s3://{bucket}/{key} ({size} bytes)");
    Ok(())
}

/// Writes an upload to a temp file in `dir`. The file is removed when the
/// returned handle is dropped.
pub async fn stage_upload(dir: &Path, bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let staged = NamedTempFile::new_in(dir)?;
    tokio::fs::write(staged.path(), bytes).await?;
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_sanitizes_filename() {
        assert_eq!(
            object_key("Jane Doe/CV (final).pdf", 1700000000000),
            "resumes/1700000000000_Jane_Doe_CV__final_.pdf"
        );
    }

    #[test]
    fn test_public_url_for_aws() {
        assert_eq!(
            public_url(None, "cvs", "eu-north-1", "resumes/1_a.pdf"),
            "https://cvs.s3.eu-north-1.amazonaws.com/resumes/1_a.pdf"
        );
    }

    #[test]
    fn test_public_url_for_custom_endpoint() {
        assert_eq!(
            public_url(Some("http://localhost:9000/"), "cvs", "us-east-1", "resumes/1_a.pdf"),
            "http://localhost:9000/cvs/resumes/1_a.pdf"
        );
    }

    #[tokio::test]
    async fn test_staged_upload_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage_upload(dir.path(), b"%PDF-1.4").await.unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
        drop(staged);
        assert!(!path.exists());
    }
}
