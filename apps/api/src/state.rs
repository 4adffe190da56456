use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::llm_client::Completer;
use crate::screening::shortlist::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    /// Completion seam. `GeminiClient` in production, scripted in tests.
    pub completer: Arc<dyn Completer>,
    /// Per-session shortlist storage (Redis in production).
    pub sessions: Arc<dyn SessionStore>,
    pub config: Config,
}
