use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::retry::BackoffKind;
use crate::screening::shortlist::ShortlistPolicy;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Unset means sessions are kept in process memory.
    pub redis_url: Option<String>,
    pub s3_bucket: String,
    /// Custom S3 endpoint (MinIO). `None` means AWS proper.
    pub s3_endpoint: Option<String>,
    pub aws_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub gemini_api_key: String,
    pub jwt_secret: String,
    pub port: u16,
    pub rust_log: String,
    pub upload_dir: PathBuf,
    pub completion_timeout: Duration,
    pub completion_max_attempts: u32,
    pub completion_retry_delay: Duration,
    pub completion_backoff: BackoffKind,
    /// Overrides the public generative-language host.
    pub completion_base_url: Option<String>,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub shortlist_policy: ShortlistPolicy,
    pub session_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: std::env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            aws_region: require_env("AWS_REGION")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            jwt_secret: require_env("JWT_SECRET")?,
            port: parse_env("PORT", 3000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            completion_timeout: Duration::from_secs(parse_env("COMPLETION_TIMEOUT_SECS", 60)?),
            completion_max_attempts: parse_env("COMPLETION_MAX_ATTEMPTS", 3)?,
            completion_retry_delay: Duration::from_secs(parse_env(
                "COMPLETION_RETRY_DELAY_SECS",
                5,
            )?),
            completion_backoff: parse_env("COMPLETION_BACKOFF", BackoffKind::Fixed)?,
            completion_base_url: std::env::var("COMPLETION_BASE_URL").ok().filter(|s| !s.is_empty()),
            batch_size: parse_env::<usize>("BATCH_SIZE", 5)?.clamp(1, 10),
            batch_delay: Duration::from_secs(parse_env("BATCH_DELAY_SECS", 5)?),
            shortlist_policy: parse_env("SHORTLIST_POLICY", ShortlistPolicy::Dedupe)?,
            session_ttl_secs: parse_env("SESSION_TTL_SECS", 86_400)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Reads an optional variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
