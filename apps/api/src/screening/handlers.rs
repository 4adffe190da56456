use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::RecruiterIdentity;
use crate::errors::AppError;
use crate::intake::handlers::{read_multipart, MAX_BATCH_FILES};
use crate::intake::ResumeDocument;
use crate::models::resume::ResumeRecordRow;
use crate::screening::batch::{run_batch, BatchItem, BatchOptions, BatchReport};
use crate::screening::records::{save_batch_records, shortlisted_records};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResumeInput {
    pub filename: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBatchRequest {
    #[serde(default)]
    pub resumes: Vec<ResumeInput>,
    pub job_description: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub data: Vec<BatchItem>,
    /// The session's cumulative shortlist after this batch.
    pub shortlist: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

fn batch_options(state: &AppState) -> BatchOptions {
    BatchOptions {
        group_size: state.config.batch_size,
        inter_group_delay: state.config.batch_delay,
    }
}

fn session_key(identity: &RecruiterIdentity, session_id: Option<String>) -> String {
    session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| identity.recruiter_id.to_string())
}

/// Folds a finished batch into the session shortlist and the record table.
async fn finish_batch(
    state: &AppState,
    identity: &RecruiterIdentity,
    session_id: String,
    report: BatchReport,
) -> Result<BatchResponse, AppError> {
    let shortlist = state
        .sessions
        .append(&session_id, &report.shortlisted(), state.config.shortlist_policy)
        .await?;

    save_batch_records(&state.db, identity.recruiter_id, &report.items).await;

    info!(
        "Session {session_id}: {} resumes screened, shortlist now {}",
        report.items.len(),
        shortlist.len()
    );
    Ok(BatchResponse {
        data: report.items,
        shortlist,
        warnings: report.warnings,
    })
}

/// POST /recruiter/analyze-batch
pub async fn handle_analyze_batch(
    State(state): State<AppState>,
    identity: RecruiterIdentity,
    Json(req): Json<AnalyzeBatchRequest>,
) -> Result<Json<BatchResponse>, AppError> {
    let documents = req
        .resumes
        .into_iter()
        .map(|r| ResumeDocument::from_text(r.filename, r.text))
        .collect();
    let job_description = req.job_description.unwrap_or_default();

    let report = run_batch(
        state.completer.clone(),
        documents,
        &job_description,
        &batch_options(&state),
    )
    .await?;

    let session_id = session_key(&identity, req.session_id);
    Ok(Json(finish_batch(&state, &identity, session_id, report).await?))
}

/// POST /recruiter/screen
///
/// Multipart upload of `resumes` files plus a `jobDescription` field; text
/// extraction happens inside the batch.
pub async fn handle_screen(
    State(state): State<AppState>,
    identity: RecruiterIdentity,
    mut multipart: Multipart,
) -> Result<Json<BatchResponse>, AppError> {
    let mut form = read_multipart(&mut multipart, "resumes").await?;
    if form.files.len() > MAX_BATCH_FILES {
        return Err(AppError::Validation(format!(
            "At most {MAX_BATCH_FILES} files can be screened at once"
        )));
    }

    let job_description = form.fields.remove("jobDescription").unwrap_or_default();
    let session_id = session_key(&identity, form.fields.remove("sessionId"));
    let documents = form
        .files
        .into_iter()
        .map(|f| ResumeDocument::from_upload(f.filename, f.content_type.as_deref(), f.bytes))
        .collect();

    let report = run_batch(
        state.completer.clone(),
        documents,
        &job_description,
        &batch_options(&state),
    )
    .await?;

    Ok(Json(finish_batch(&state, &identity, session_id, report).await?))
}

/// GET /recruiter/shortlist
pub async fn handle_get_shortlist(
    State(state): State<AppState>,
    identity: RecruiterIdentity,
    Query(query): Query<SessionQuery>,
) -> Result<Json<ListResponse<String>>, AppError> {
    let session_id = session_key(&identity, query.session_id);
    let data = state.sessions.load(&session_id).await?;
    Ok(Json(ListResponse { data }))
}

/// GET /recruiter/shortlisted-resumes
pub async fn handle_shortlisted_resumes(
    State(state): State<AppState>,
    identity: RecruiterIdentity,
) -> Result<Json<ListResponse<ResumeRecordRow>>, AppError> {
    let data = shortlisted_records(&state.db, identity.recruiter_id).await?;
    Ok(Json(ListResponse { data }))
}
